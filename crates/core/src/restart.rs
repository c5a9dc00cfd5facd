use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::errors::{RegistryError, ValidationError};
use crate::registry::CustomerStore;
use crate::workflow::{DeploymentWorkflow, WorkflowOutcome};

#[derive(Debug, Error)]
pub enum RestartError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Validates a restart request against freshly loaded customer data, then runs the workflow.
pub struct RestartService {
    customers: Arc<dyn CustomerStore>,
    workflow: DeploymentWorkflow,
}

impl RestartService {
    pub fn new(customers: Arc<dyn CustomerStore>, workflow: DeploymentWorkflow) -> Self {
        Self { customers, workflow }
    }

    pub async fn restart(
        &self,
        customer_name: &str,
        environment: &str,
        application: &str,
    ) -> Result<WorkflowOutcome, RestartError> {
        let registry = self.customers.load()?;
        let target = registry.validate(customer_name, environment, application)?;

        info!(
            event_name = "restart.validated",
            customer = %target.customer().name,
            customer_code = %target.customer().code,
            environment = %target.environment(),
            application = %target.application(),
            "restart request validated"
        );

        Ok(self.workflow.execute(&target).await)
    }
}
