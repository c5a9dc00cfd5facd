pub mod engine;
pub mod merge;
pub mod outcome;
pub mod repository;

pub use engine::{DeploymentWorkflow, WorkflowSettings};
pub use merge::{ApprovalError, MergeError, MergePlan, MergeStep, OnFailure};
pub use outcome::WorkflowOutcome;
pub use repository::{
    ChangeApprover, FileContents, FileUpdate, MergeReceipt, MergeRequest, MergeStrategy,
    NewPullRequest, PullRequest, RemoteRepository, RepositoryError,
};
