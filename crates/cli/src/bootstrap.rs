use std::sync::Arc;

use relaunch_agent::{ActionRegistry, AgentRuntime, LlmClient, LoopObserver, OpenAiChatClient};
use relaunch_core::audit::TracingAuditSink;
use relaunch_core::clock::SystemClock;
use relaunch_core::config::{AppConfig, LogFormat};
use relaunch_core::registry::CsvCustomerStore;
use relaunch_core::restart::RestartService;
use relaunch_core::workflow::{ChangeApprover, DeploymentWorkflow, RemoteRepository};
use relaunch_github::{GitHubClient, RemoteUrlError, RepositorySlug};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no completion credential configured (set RELAUNCH_LLM_API_KEY or GITHUB_TOKEN)")]
    MissingLlmCredential,
    #[error(transparent)]
    RepositoryUrl(#[from] RemoteUrlError),
}

/// Author and approver handles. Both are absent when restarts are simulated.
pub struct RepositoryHandles {
    pub slug: Option<RepositorySlug>,
    pub repository: Option<Arc<dyn RemoteRepository>>,
    pub approver: Option<Arc<dyn ChangeApprover>>,
}

pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // Ignored when a subscriber is already installed, e.g. by an earlier command in the process.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn repository_handles(config: &AppConfig) -> Result<RepositoryHandles, BootstrapError> {
    let repository = &config.repository;
    let (Some(url), Some(token)) = (&repository.url, &repository.token) else {
        if repository.url.is_some() {
            warn!(
                event_name = "system.bootstrap.repository_token_missing",
                "repository url is set but no token is configured; restarts will be simulated"
            );
        }
        return Ok(RepositoryHandles { slug: None, repository: None, approver: None });
    };

    let slug = RepositorySlug::parse(url)?;
    let author =
        GitHubClient::new(repository.api_base_url.clone(), slug.clone(), token.clone());
    let approver = repository.approval_credential().map(|credential| {
        let client =
            GitHubClient::new(repository.api_base_url.clone(), slug.clone(), credential.clone());
        Arc::new(client) as Arc<dyn ChangeApprover>
    });

    Ok(RepositoryHandles {
        slug: Some(slug),
        repository: Some(Arc::new(author) as Arc<dyn RemoteRepository>),
        approver,
    })
}

pub fn build_runtime(
    config: &AppConfig,
    observer: Arc<dyn LoopObserver>,
) -> Result<AgentRuntime, BootstrapError> {
    let api_key = config.llm.api_key.clone().ok_or(BootstrapError::MissingLlmCredential)?;
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiChatClient::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        api_key,
    ));

    let handles = repository_handles(config)?;
    let live = handles.repository.is_some();
    let workflow = DeploymentWorkflow::new(
        handles.repository,
        handles.approver,
        config.workflow_settings(),
        Arc::new(SystemClock),
        Arc::new(TracingAuditSink),
    );
    let customers = Arc::new(CsvCustomerStore::new(config.registry.customers_path.clone()));
    let restart = Arc::new(RestartService::new(customers, workflow));

    info!(
        event_name = "system.bootstrap.ready",
        model = %config.llm.model,
        live,
        repository = %handles.slug.map(|slug| slug.to_string()).unwrap_or_default(),
        customers_path = %config.registry.customers_path.display(),
        max_turns = config.agent.max_turns,
        "agent runtime ready"
    );

    Ok(AgentRuntime::new(llm, ActionRegistry::new(restart), config.agent.max_turns)
        .with_observer(observer))
}
