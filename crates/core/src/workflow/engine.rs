//! The restart workflow: rewrite one record's comment in the remote configuration document and
//! land that change on trunk through a branch, a pull request, an approval and a merge.
//!
//! Every step is awaited in order and gated on the one before it. The engine never returns an
//! error; each terminal path is reported as a [`WorkflowOutcome`] and recorded in the audit sink.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::clock::Clock;
use crate::document::{document_path, RemoteConfigDocument};
use crate::domain::RestartTarget;
use crate::errors::DocumentError;
use crate::workflow::merge::{ApprovalError, MergePlan, MergeSuccess};
use crate::workflow::outcome::WorkflowOutcome;
use crate::workflow::repository::{ChangeApprover, FileUpdate, NewPullRequest, RemoteRepository};

pub const DEFAULT_BRANCH_PREFIX: &str = "Agent-Adi-restart";
pub const DEFAULT_TRUNK_BRANCH: &str = "main";
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

const DOCUMENT_NAME: &str = "vmss-management.json";
const APPROVAL_BODY: &str = "Auto-approved by restart agent";
const MERGE_MESSAGE: &str = "Auto-merged by restart agent";
const ACTOR: &str = "deployment-workflow";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub trunk_branch: String,
    pub branch_prefix: String,
    /// Pause between approval and the first merge attempt.
    pub settle_delay: Duration,
    pub merge_plan: MergePlan,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            trunk_branch: DEFAULT_TRUNK_BRANCH.to_string(),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            merge_plan: MergePlan::default(),
        }
    }
}

pub struct DeploymentWorkflow {
    repository: Option<Arc<dyn RemoteRepository>>,
    approver: Option<Arc<dyn ChangeApprover>>,
    settings: WorkflowSettings,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl DeploymentWorkflow {
    pub fn new(
        repository: Option<Arc<dyn RemoteRepository>>,
        approver: Option<Arc<dyn ChangeApprover>>,
        settings: WorkflowSettings,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { repository, approver, settings, clock, audit }
    }

    /// True when a repository handle is present and changes will really be pushed.
    pub fn is_live(&self) -> bool {
        self.repository.is_some()
    }

    pub async fn execute(&self, target: &RestartTarget) -> WorkflowOutcome {
        let run = Run {
            correlation_id: format!("restart-{}", Uuid::new_v4()),
            target,
            started_at: self.clock.now(),
        };

        info!(
            event_name = "workflow.started",
            correlation_id = %run.correlation_id,
            customer = %target.customer().name,
            customer_code = %target.customer().code,
            environment = %target.environment(),
            application = %target.application(),
            live = self.is_live(),
            "restart workflow started"
        );

        let outcome = match &self.repository {
            Some(repository) => self.execute_live(&run, repository.as_ref()).await,
            None => {
                warn!(
                    event_name = "workflow.simulated",
                    correlation_id = %run.correlation_id,
                    "no repository configured; restart is simulated"
                );
                WorkflowOutcome::Success(format!(
                    "{} No repository is configured, so no repository change was made.",
                    run.restarted_summary()
                ))
            }
        };

        let audit_outcome = match outcome {
            WorkflowOutcome::Success(_) => AuditOutcome::Success,
            WorkflowOutcome::PartialSuccess(_) | WorkflowOutcome::Failure(_) => {
                AuditOutcome::Failed
            }
        };
        self.record(
            &run,
            "workflow.finished",
            AuditCategory::System,
            audit_outcome,
            &[("status", outcome.status()), ("description", outcome.description())],
        );

        outcome
    }

    async fn execute_live(
        &self,
        run: &Run<'_>,
        repository: &dyn RemoteRepository,
    ) -> WorkflowOutcome {
        let target = run.target;
        let code = target.customer().code.0.as_str();
        let environment = target.environment();
        let trunk = self.settings.trunk_branch.as_str();
        let path = document_path(code, environment);
        let record_name = target.application().record_name();

        let current = match repository.read_file(&path, trunk).await {
            Ok(current) => current,
            Err(error) => {
                let error = DocumentError::Unreadable(error.to_string());
                return self.fail(
                    run,
                    "workflow.document.unreadable",
                    AuditCategory::Document,
                    format!("Error reading {DOCUMENT_NAME} for {code} {environment}: {error}"),
                );
            }
        };

        let mut document = match RemoteConfigDocument::parse(&current.content) {
            Ok(document) => document,
            Err(error) => {
                return self.fail(
                    run,
                    "workflow.document.unreadable",
                    AuditCategory::Document,
                    format!("Error reading {DOCUMENT_NAME} for {code} {environment}: {error}"),
                );
            }
        };

        let comment = format!(
            "Restarted at {} UTC for {code} in {environment}",
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        match document.update_comment(record_name, &comment) {
            Ok(()) => {}
            Err(DocumentError::RecordNotFound(_)) => {
                return self.fail(
                    run,
                    "workflow.document.record_not_found",
                    AuditCategory::Document,
                    format!(
                        "Application '{record_name}' not found in {DOCUMENT_NAME} for {code} {environment}"
                    ),
                );
            }
            Err(error) => {
                return self.fail(
                    run,
                    "workflow.document.unreadable",
                    AuditCategory::Document,
                    format!("Error updating {DOCUMENT_NAME} for {code} {environment}: {error}"),
                );
            }
        }

        let rendered = match document.to_pretty_string() {
            Ok(rendered) => rendered,
            Err(error) => {
                return self.fail(
                    run,
                    "workflow.document.unreadable",
                    AuditCategory::Document,
                    format!("Error updating {DOCUMENT_NAME} for {code} {environment}: {error}"),
                );
            }
        };

        let trunk_head = match repository.branch_head(trunk).await {
            Ok(sha) => sha,
            Err(error) => {
                return self.fail(
                    run,
                    "workflow.branch.trunk_unresolved",
                    AuditCategory::Repository,
                    format!("Could not resolve trunk branch '{trunk}': {error}"),
                );
            }
        };

        let branch = format!(
            "{}-{code}-{environment}-{record_name}-{}",
            self.settings.branch_prefix,
            run.started_at.format("%Y%m%d-%H%M%S")
        );
        if let Err(error) = repository.create_branch(&branch, &trunk_head).await {
            return self.fail(
                run,
                "workflow.branch.create_failed",
                AuditCategory::Repository,
                format!("Could not create branch '{branch}': {error}"),
            );
        }
        self.record(
            run,
            "workflow.branch.created",
            AuditCategory::Repository,
            AuditOutcome::Success,
            &[("branch", branch.as_str()), ("from", trunk_head.as_str())],
        );

        let title = format!("Restart {} for {code} in {environment}", target.application());
        let update = FileUpdate {
            path: path.clone(),
            branch: branch.clone(),
            message: title.clone(),
            content: rendered,
            expected_sha: current.sha,
        };
        let commit = match repository.update_file(&update).await {
            Ok(commit) => commit,
            Err(error) => {
                return self.fail(
                    run,
                    "workflow.commit.failed",
                    AuditCategory::Repository,
                    format!("Could not commit {DOCUMENT_NAME} to branch '{branch}': {error}"),
                );
            }
        };
        self.record(
            run,
            "workflow.commit.created",
            AuditCategory::Repository,
            AuditOutcome::Success,
            &[("branch", branch.as_str()), ("commit", commit.as_str())],
        );

        let request = NewPullRequest {
            title: title.clone(),
            body: pull_request_body(run, record_name, &path),
            head: branch.clone(),
            base: trunk.to_string(),
        };
        let pull_request = match repository.open_pull_request(&request).await {
            Ok(pull_request) => pull_request,
            Err(error) => {
                return self.fail(
                    run,
                    "workflow.pull_request.failed",
                    AuditCategory::Repository,
                    format!("Could not open a pull request from branch '{branch}': {error}"),
                );
            }
        };
        let number = pull_request.number.to_string();
        self.record(
            run,
            "workflow.pull_request.opened",
            AuditCategory::Repository,
            AuditOutcome::Success,
            &[("pull_request", number.as_str()), ("url", pull_request.html_url.as_str())],
        );

        if let Err(error) = self.approve(pull_request.number).await {
            warn!(
                event_name = "workflow.approval.skipped",
                correlation_id = %run.correlation_id,
                pull_request = pull_request.number,
                error = %error,
                "approval not required or failed"
            );
            self.record(
                run,
                "workflow.approval.failed",
                AuditCategory::Approval,
                AuditOutcome::Rejected,
                &[("pull_request", number.as_str()), ("error", error.to_string().as_str())],
            );
        } else {
            self.record(
                run,
                "workflow.approval.granted",
                AuditCategory::Approval,
                AuditOutcome::Success,
                &[("pull_request", number.as_str())],
            );
        }

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        let merge_title = format!("Merge PR #{}: {title}", pull_request.number);
        match self
            .settings
            .merge_plan
            .run(repository, pull_request.number, &merge_title, MERGE_MESSAGE)
            .await
        {
            Ok(merged) => {
                self.record(
                    run,
                    "workflow.merge.completed",
                    AuditCategory::Merge,
                    AuditOutcome::Success,
                    &[
                        ("pull_request", number.as_str()),
                        ("strategy", merged.strategy.as_str()),
                        ("sha", merged.receipt.sha.as_str()),
                    ],
                );
                WorkflowOutcome::Success(format!(
                    "{} {}",
                    run.restarted_summary(),
                    merge_summary(pull_request.number, &merged)
                ))
            }
            Err(error) => {
                self.record(
                    run,
                    "workflow.merge.failed",
                    AuditCategory::Merge,
                    AuditOutcome::Failed,
                    &[("pull_request", number.as_str()), ("error", error.to_string().as_str())],
                );
                WorkflowOutcome::PartialSuccess(format!(
                    "PR created but auto-merge failed: {}",
                    pull_request.html_url
                ))
            }
        }
    }

    async fn approve(&self, pull_request: u64) -> Result<(), ApprovalError> {
        let approver = self.approver.as_ref().ok_or(ApprovalError::NotConfigured)?;
        approver
            .approve(pull_request, APPROVAL_BODY)
            .await
            .map_err(|source| ApprovalError::Rejected { pull_request, source })
    }

    fn fail(
        &self,
        run: &Run<'_>,
        event_type: &str,
        category: AuditCategory,
        description: String,
    ) -> WorkflowOutcome {
        warn!(
            event_name = event_type,
            correlation_id = %run.correlation_id,
            description = %description,
            "restart workflow step failed"
        );
        self.record(
            run,
            event_type,
            category,
            AuditOutcome::Failed,
            &[("description", description.as_str())],
        );
        WorkflowOutcome::Failure(description)
    }

    fn record(
        &self,
        run: &Run<'_>,
        event_type: &str,
        category: AuditCategory,
        outcome: AuditOutcome,
        metadata: &[(&str, &str)],
    ) {
        let event = metadata.iter().fold(
            AuditEvent::new(&run.correlation_id, event_type, category, ACTOR, outcome)
                .for_target(&run.target.customer().code, run.target.environment())
                .with_metadata("application", run.target.application().display_name()),
            |event, (key, value)| event.with_metadata(*key, *value),
        );
        self.audit.emit(event);
    }
}

struct Run<'a> {
    correlation_id: String,
    target: &'a RestartTarget,
    started_at: DateTime<Utc>,
}

impl Run<'_> {
    fn restarted_summary(&self) -> String {
        format!(
            "Restarted {} for {} and code {} in {} environment.",
            self.target.application(),
            self.target.customer().name,
            self.target.customer().code,
            self.target.environment()
        )
    }
}

fn merge_summary(number: u64, merged: &MergeSuccess) -> String {
    let fallback = merged
        .failed
        .iter()
        .map(|attempt| attempt.strategy.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    if merged.used_fallback() {
        format!(
            "PR #{number} merged with {} after {fallback} failed; merge commit {}.",
            merged.strategy, merged.receipt.sha
        )
    } else {
        format!(
            "PR #{number} merged with {}; merge commit {}.",
            merged.strategy, merged.receipt.sha
        )
    }
}

fn pull_request_body(run: &Run<'_>, record_name: &str, path: &str) -> String {
    let target = run.target;
    format!(
        "## Restart Request\n\n\
         **Customer:** {} ({})\n\
         **Environment:** {}\n\
         **Application:** {}\n\
         **Timestamp:** {} UTC\n\n\
         ### Changes\n\
         - Updated comment for {record_name} in {DOCUMENT_NAME}\n\
         - Added restart timestamp for tracking\n\n\
         ### File Modified\n\
         - `{path}`\n\n\
         This PR was automatically created by the restart agent.\n",
        target.customer().name,
        target.customer().code,
        target.environment(),
        target.application(),
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
    )
}
