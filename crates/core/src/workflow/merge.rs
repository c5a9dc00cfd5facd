use thiserror::Error;
use tracing::warn;

use crate::workflow::repository::{
    MergeReceipt, MergeRequest, MergeStrategy, RemoteRepository, RepositoryError,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("no approval credential is configured")]
    NotConfigured,
    #[error("approval of pull request #{pull_request} failed: {source}")]
    Rejected { pull_request: u64, source: RepositoryError },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("merge plan has no steps")]
    EmptyPlan,
    #[error("{} merge attempt(s) failed: {}", .attempts.len(), describe_attempts(.attempts))]
    Exhausted { attempts: Vec<FailedAttempt> },
}

fn describe_attempts(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.strategy, attempt.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedAttempt {
    pub strategy: MergeStrategy,
    pub error: RepositoryError,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnFailure {
    /// Move on to the next step.
    #[default]
    Continue,
    /// Give up without trying later steps.
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeStep {
    pub strategy: MergeStrategy,
    pub on_failure: OnFailure,
}

/// Ordered merge attempts. The first step that succeeds wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergePlan {
    steps: Vec<MergeStep>,
}

impl Default for MergePlan {
    fn default() -> Self {
        Self::from_strategies([MergeStrategy::Squash, MergeStrategy::Merge])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeSuccess {
    pub receipt: MergeReceipt,
    pub strategy: MergeStrategy,
    /// Strategies that failed before this one succeeded.
    pub failed: Vec<FailedAttempt>,
}

impl MergeSuccess {
    pub fn used_fallback(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl MergePlan {
    pub fn new(steps: Vec<MergeStep>) -> Self {
        Self { steps }
    }

    pub fn from_strategies(strategies: impl IntoIterator<Item = MergeStrategy>) -> Self {
        Self::new(
            strategies
                .into_iter()
                .map(|strategy| MergeStep { strategy, on_failure: OnFailure::Continue })
                .collect(),
        )
    }

    pub fn steps(&self) -> &[MergeStep] {
        &self.steps
    }

    pub async fn run(
        &self,
        repository: &dyn RemoteRepository,
        number: u64,
        commit_title: &str,
        commit_message: &str,
    ) -> Result<MergeSuccess, MergeError> {
        if self.steps.is_empty() {
            return Err(MergeError::EmptyPlan);
        }

        let mut failed = Vec::new();
        for step in &self.steps {
            let request = MergeRequest {
                number,
                strategy: step.strategy,
                commit_title: commit_title.to_string(),
                commit_message: commit_message.to_string(),
            };

            match repository.merge_pull_request(&request).await {
                Ok(receipt) => {
                    return Ok(MergeSuccess { receipt, strategy: step.strategy, failed });
                }
                Err(error) => {
                    warn!(
                        event_name = "workflow.merge.attempt_failed",
                        pull_request = number,
                        strategy = %step.strategy,
                        error = %error,
                        "merge attempt failed"
                    );
                    failed.push(FailedAttempt { strategy: step.strategy, error });
                    if step.on_failure == OnFailure::Stop {
                        break;
                    }
                }
            }
        }

        Err(MergeError::Exhausted { attempts: failed })
    }
}
