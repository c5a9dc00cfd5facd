use std::path::PathBuf;

use thiserror::Error;

/// Registry gate failures. Each message lists the valid alternatives so a caller can correct
/// its request from the message alone.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Customer '{customer}' not recognized. Available customers: {}", .available.join(", "))]
    UnknownCustomer { customer: String, available: Vec<String> },
    #[error(
        "Environment '{environment}' not valid for customer '{customer}'. Available environments: {}",
        .available.join(", ")
    )]
    InvalidEnvironment { customer: String, environment: String, available: Vec<String> },
    #[error("Application '{application}' not recognized. Available applications: {}", .available.join(", "))]
    UnknownApplication { application: String, available: Vec<String> },
}

impl ValidationError {
    pub fn available(&self) -> &[String] {
        match self {
            Self::UnknownCustomer { available, .. }
            | Self::InvalidEnvironment { available, .. }
            | Self::UnknownApplication { available, .. } => available,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read customer registry `{path}`: {source}")]
    Read { path: PathBuf, source: csv::Error },
    #[error("customer registry `{path}` row {row} is unreadable: {source}")]
    Row { path: PathBuf, row: u64, source: csv::Error },
}

/// Problems with the remote configuration document. None of these are retried: they signal
/// drift between the expected and actual remote state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document could not be read: {0}")]
    Unreadable(String),
    #[error("document is not valid JSON: {0}")]
    Malformed(String),
    #[error("document has no `apps` sequence")]
    MissingApps,
    #[error("application '{0}' not found in document")]
    RecordNotFound(String),
}
