pub mod audit;
pub mod clock;
pub mod config;
pub mod document;
pub mod domain;
pub mod errors;
pub mod registry;
pub mod restart;
pub mod workflow;

pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use document::{document_path, RemoteConfigDocument};
pub use domain::{Application, CustomerCode, CustomerRecord, RestartTarget};
pub use errors::{DocumentError, RegistryError, ValidationError};
pub use registry::{CsvCustomerStore, CustomerRegistry, CustomerStore};
pub use restart::{RestartError, RestartService};
pub use workflow::{DeploymentWorkflow, WorkflowOutcome, WorkflowSettings};
