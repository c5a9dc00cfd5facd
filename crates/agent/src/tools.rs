use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use relaunch_core::restart::{RestartError, RestartService};
use relaunch_core::workflow::WorkflowOutcome;
use thiserror::Error;
use tracing::info;

use crate::extract::ActionRequest;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown action: {name} (known actions: {})", .known.join(", "))]
    UnknownAction { name: String, known: Vec<String> },
    #[error("action `{action}` is missing parameter `{parameter}`")]
    MissingParameter { action: ActionKind, parameter: &'static str },
    #[error("action `{action}` does not accept parameter `{parameter}`")]
    UnexpectedParameter { action: ActionKind, parameter: String },
}

/// The closed set of actions a model may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    RestartApplication,
    GetResponseTime,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [Self::RestartApplication, Self::GetResponseTime];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RestartApplication => "restart_application",
            Self::GetResponseTime => "get_response_time",
        }
    }

    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            Self::RestartApplication => &["customer_name", "environment", "application"],
            Self::GetResponseTime => &["url"],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A request that has passed the parameter contract of its action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    RestartApplication { customer_name: String, environment: String, application: String },
    GetResponseTime { url: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::RestartApplication { .. } => ActionKind::RestartApplication,
            Self::GetResponseTime { .. } => ActionKind::GetResponseTime,
        }
    }

    fn bind(kind: ActionKind, params: &BTreeMap<String, String>) -> Result<Self, DispatchError> {
        let unexpected = params.keys().find(|key| !kind.parameters().contains(&key.as_str()));
        if let Some(unexpected) = unexpected {
            return Err(DispatchError::UnexpectedParameter {
                action: kind,
                parameter: unexpected.clone(),
            });
        }

        let take = |parameter: &'static str| {
            params
                .get(parameter)
                .cloned()
                .ok_or(DispatchError::MissingParameter { action: kind, parameter })
        };

        Ok(match kind {
            ActionKind::RestartApplication => Self::RestartApplication {
                customer_name: take("customer_name")?,
                environment: take("environment")?,
                application: take("application")?,
            },
            ActionKind::GetResponseTime => Self::GetResponseTime { url: take("url")? },
        })
    }
}

#[async_trait]
pub trait RestartHandler: Send + Sync {
    async fn restart(
        &self,
        customer_name: &str,
        environment: &str,
        application: &str,
    ) -> Result<WorkflowOutcome, RestartError>;
}

#[async_trait]
impl RestartHandler for RestartService {
    async fn restart(
        &self,
        customer_name: &str,
        environment: &str,
        application: &str,
    ) -> Result<WorkflowOutcome, RestartError> {
        RestartService::restart(self, customer_name, environment, application).await
    }
}

/// Simulated latency lookup, in seconds.
pub fn response_time(url: &str) -> Option<f64> {
    match url.trim() {
        "facebook.com" => Some(0.5),
        "google.com" => Some(0.3),
        "openai.com" => Some(0.4),
        _ => None,
    }
}

pub struct ActionRegistry {
    restart: Arc<dyn RestartHandler>,
}

impl ActionRegistry {
    pub fn new(restart: Arc<dyn RestartHandler>) -> Self {
        Self { restart }
    }

    pub fn names(&self) -> Vec<String> {
        ActionKind::ALL.iter().map(|kind| kind.name().to_string()).collect()
    }

    pub fn lookup(&self, name: &str) -> Option<ActionKind> {
        ActionKind::ALL.into_iter().find(|kind| kind.name() == name.trim())
    }

    /// Resolves, binds and runs one request. The returned text goes back to the model verbatim;
    /// only contract violations are errors.
    pub async fn dispatch(&self, request: &ActionRequest) -> Result<String, DispatchError> {
        let kind = self.lookup(&request.function_name).ok_or_else(|| DispatchError::UnknownAction {
            name: request.function_name.clone(),
            known: self.names(),
        })?;
        let action = Action::bind(kind, &request.function_parms)?;

        info!(event_name = "agent.dispatch.started", action = %kind, "dispatching action");

        let response = match action {
            Action::RestartApplication { customer_name, environment, application } => {
                match self.restart.restart(&customer_name, &environment, &application).await {
                    Ok(outcome) => outcome.description().to_string(),
                    Err(error) => format!("Error: {error}"),
                }
            }
            Action::GetResponseTime { url } => match response_time(&url) {
                Some(seconds) => seconds.to_string(),
                None => format!("No response time data for {url}"),
            },
        };

        info!(event_name = "agent.dispatch.completed", action = %kind, "action completed");
        Ok(response)
    }
}
