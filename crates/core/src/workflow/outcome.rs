use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal result of one workflow execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "description", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Success(String),
    /// Some remote state was changed but the run did not finish, e.g. a pull request left open.
    PartialSuccess(String),
    Failure(String),
}

impl WorkflowOutcome {
    pub fn description(&self) -> &str {
        match self {
            Self::Success(description)
            | Self::PartialSuccess(description)
            | Self::Failure(description) => description,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::PartialSuccess(_) => "partial_success",
            Self::Failure(_) => "failure",
        }
    }
}

impl fmt::Display for WorkflowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
