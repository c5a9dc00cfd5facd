use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::engine::{DEFAULT_BRANCH_PREFIX, DEFAULT_TRUNK_BRANCH};
use crate::workflow::merge::MergePlan;
use crate::workflow::repository::MergeStrategy;
use crate::workflow::WorkflowSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub repository: RepositoryConfig,
    pub registry: RegistryConfig,
    pub agent: AgentConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct RepositoryConfig {
    /// `https://github.com/owner/repo` or `owner/repo`.
    pub url: Option<String>,
    pub token: Option<SecretString>,
    /// Separate reviewer credential. Falls back to `token` when absent.
    pub approval_token: Option<SecretString>,
    pub api_base_url: String,
    pub trunk_branch: String,
}

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub customers_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Upper bound on model round-trips per command.
    pub max_turns: u32,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub settle_delay_secs: u64,
    pub branch_prefix: String,
    pub merge_strategies: Vec<MergeStrategy>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
    pub repository_url: Option<String>,
    pub customers_path: Option<PathBuf>,
    pub max_turns: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_LLM_BASE_URL: &str = "https://models.inference.ai.azure.com";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                model: DEFAULT_LLM_MODEL.to_string(),
            },
            repository: RepositoryConfig {
                url: None,
                token: None,
                approval_token: None,
                api_base_url: DEFAULT_GITHUB_API_URL.to_string(),
                trunk_branch: DEFAULT_TRUNK_BRANCH.to_string(),
            },
            registry: RegistryConfig { customers_path: PathBuf::from("customers.csv") },
            agent: AgentConfig { max_turns: 4 },
            workflow: WorkflowConfig {
                settle_delay_secs: 5,
                branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
                merge_strategies: vec![MergeStrategy::Squash, MergeStrategy::Merge],
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl RepositoryConfig {
    /// Both a repository and an author credential are present, so restarts change real state.
    pub fn is_live(&self) -> bool {
        self.url.is_some() && self.token.is_some()
    }

    pub fn approval_credential(&self) -> Option<&SecretString> {
        self.approval_token.as_ref().or(self.token.as_ref())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("relaunch.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            trunk_branch: self.repository.trunk_branch.clone(),
            branch_prefix: self.workflow.branch_prefix.clone(),
            settle_delay: Duration::from_secs(self.workflow.settle_delay_secs),
            merge_plan: MergePlan::from_strategies(self.workflow.merge_strategies.iter().copied()),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
        }

        if let Some(repository) = patch.repository {
            if let Some(url) = repository.url {
                self.repository.url = Some(url);
            }
            if let Some(token_value) = repository.token {
                self.repository.token = Some(secret_value(token_value));
            }
            if let Some(approval_token_value) = repository.approval_token {
                self.repository.approval_token = Some(secret_value(approval_token_value));
            }
            if let Some(api_base_url) = repository.api_base_url {
                self.repository.api_base_url = api_base_url;
            }
            if let Some(trunk_branch) = repository.trunk_branch {
                self.repository.trunk_branch = trunk_branch;
            }
        }

        if let Some(registry) = patch.registry {
            if let Some(customers_path) = registry.customers_path {
                self.registry.customers_path = customers_path;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_turns) = agent.max_turns {
                self.agent.max_turns = max_turns;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(settle_delay_secs) = workflow.settle_delay_secs {
                self.workflow.settle_delay_secs = settle_delay_secs;
            }
            if let Some(branch_prefix) = workflow.branch_prefix {
                self.workflow.branch_prefix = branch_prefix;
            }
            if let Some(merge_strategies) = workflow.merge_strategies {
                self.workflow.merge_strategies = merge_strategies;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // GITHUB_* names are accepted for deployments that predate the RELAUNCH_* keys.
        let legacy_token = read_env("GITHUB_TOKEN");

        if let Some(value) = read_env("RELAUNCH_LLM_API_KEY").or_else(|| legacy_token.clone()) {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RELAUNCH_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("RELAUNCH_LLM_MODEL") {
            self.llm.model = value;
        }

        if let Some(value) =
            read_env("RELAUNCH_REPOSITORY_URL").or_else(|| read_env("GITHUB_REPO_URL"))
        {
            self.repository.url = Some(value);
        }
        if let Some(value) = read_env("RELAUNCH_REPOSITORY_TOKEN").or(legacy_token) {
            self.repository.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("RELAUNCH_REPOSITORY_APPROVAL_TOKEN")
            .or_else(|| read_env("GITHUB_APPROVAL_TOKEN"))
        {
            self.repository.approval_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("RELAUNCH_REPOSITORY_API_BASE_URL") {
            self.repository.api_base_url = value;
        }
        if let Some(value) = read_env("RELAUNCH_REPOSITORY_TRUNK_BRANCH") {
            self.repository.trunk_branch = value;
        }

        if let Some(value) = read_env("RELAUNCH_REGISTRY_CUSTOMERS_PATH") {
            self.registry.customers_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("RELAUNCH_AGENT_MAX_TURNS") {
            self.agent.max_turns = parse_u32("RELAUNCH_AGENT_MAX_TURNS", &value)?;
        }

        if let Some(value) = read_env("RELAUNCH_WORKFLOW_SETTLE_DELAY_SECS") {
            self.workflow.settle_delay_secs =
                parse_u64("RELAUNCH_WORKFLOW_SETTLE_DELAY_SECS", &value)?;
        }
        if let Some(value) = read_env("RELAUNCH_WORKFLOW_BRANCH_PREFIX") {
            self.workflow.branch_prefix = value;
        }
        if let Some(value) = read_env("RELAUNCH_WORKFLOW_MERGE_STRATEGIES") {
            self.workflow.merge_strategies =
                parse_strategies("RELAUNCH_WORKFLOW_MERGE_STRATEGIES", &value)?;
        }

        let log_level =
            read_env("RELAUNCH_LOGGING_LEVEL").or_else(|| read_env("RELAUNCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RELAUNCH_LOGGING_FORMAT").or_else(|| read_env("RELAUNCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(repository_url) = overrides.repository_url {
            self.repository.url = Some(repository_url);
        }
        if let Some(customers_path) = overrides.customers_path {
            self.registry.customers_path = customers_path;
        }
        if let Some(max_turns) = overrides.max_turns {
            self.agent.max_turns = max_turns;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_repository(&self.repository)?;
        validate_agent(&self.agent)?;
        validate_workflow(&self.workflow)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("relaunch.toml"), PathBuf::from("config/relaunch.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if !is_http_url(llm.base_url.trim()) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if let Some(api_key) = &llm.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.api_key is set but empty (unset it or set GITHUB_TOKEN / RELAUNCH_LLM_API_KEY)"
                    .to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_repository(repository: &RepositoryConfig) -> Result<(), ConfigError> {
    if let Some(url) = &repository.url {
        if url.trim().is_empty() {
            return Err(ConfigError::Validation("repository.url must not be empty".to_string()));
        }
    }
    if !is_http_url(repository.api_base_url.trim()) {
        return Err(ConfigError::Validation(
            "repository.api_base_url must start with http:// or https://".to_string(),
        ));
    }
    if repository.trunk_branch.trim().is_empty() {
        return Err(ConfigError::Validation(
            "repository.trunk_branch must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_turns == 0 || agent.max_turns > 50 {
        return Err(ConfigError::Validation("agent.max_turns must be in range 1..=50".to_string()));
    }
    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.settle_delay_secs > 300 {
        return Err(ConfigError::Validation(
            "workflow.settle_delay_secs must be in range 0..=300".to_string(),
        ));
    }

    let prefix = workflow.branch_prefix.trim();
    if prefix.is_empty() || prefix.contains(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "workflow.branch_prefix must be non-empty and contain no whitespace".to_string(),
        ));
    }

    if workflow.merge_strategies.is_empty() {
        return Err(ConfigError::Validation(
            "workflow.merge_strategies must list at least one strategy".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_strategies(key: &str, value: &str) -> Result<Vec<MergeStrategy>, ConfigError> {
    value
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| {
            item.parse::<MergeStrategy>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    repository: Option<RepositoryPatch>,
    registry: Option<RegistryPatch>,
    agent: Option<AgentPatch>,
    workflow: Option<WorkflowPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryPatch {
    url: Option<String>,
    token: Option<String>,
    approval_token: Option<String>,
    api_base_url: Option<String>,
    trunk_branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryPatch {
    customers_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_turns: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    settle_delay_secs: Option<u64>,
    branch_prefix: Option<String>,
    merge_strategies: Option<Vec<MergeStrategy>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
