use relaunch_core::config::{AppConfig, LoadOptions};
use relaunch_core::registry::CustomerRegistry;
use serde::Serialize;

use crate::bootstrap::{repository_handles, RepositoryHandles};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> String {
    let report = build_report(options);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_llm_credential(&config));
            checks.push(check_customer_registry(&config));
            checks.extend(check_repository(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Fail,
                error.to_string(),
            ));
            let dependent = [
                "llm_credential",
                "customer_registry",
                "repository_mode",
                "repository_connectivity",
            ];
            for name in dependent {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    // Skipped checks describe simulated mode, which is a supported setup.
    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credential(config: &AppConfig) -> DoctorCheck {
    match config.llm.api_key {
        Some(_) => DoctorCheck::new(
            "llm_credential",
            CheckStatus::Pass,
            format!(
                "credential present for model `{}` at {}",
                config.llm.model, config.llm.base_url
            ),
        ),
        None => DoctorCheck::new(
            "llm_credential",
            CheckStatus::Fail,
            "no completion credential (set RELAUNCH_LLM_API_KEY or GITHUB_TOKEN)",
        ),
    }
}

fn check_customer_registry(config: &AppConfig) -> DoctorCheck {
    let path = &config.registry.customers_path;
    match CustomerRegistry::from_path(path) {
        Ok(registry) if registry.customers().is_empty() => DoctorCheck::new(
            "customer_registry",
            CheckStatus::Fail,
            format!("`{}` contains no customers", path.display()),
        ),
        Ok(registry) => DoctorCheck::new(
            "customer_registry",
            CheckStatus::Pass,
            format!("loaded {} customers from `{}`", registry.customers().len(), path.display()),
        ),
        Err(error) => DoctorCheck::new("customer_registry", CheckStatus::Fail, error.to_string()),
    }
}

fn check_repository(config: &AppConfig) -> [DoctorCheck; 2] {
    let handles = match repository_handles(config) {
        Ok(handles) => handles,
        Err(error) => {
            return [
                DoctorCheck::new("repository_mode", CheckStatus::Fail, error.to_string()),
                DoctorCheck::new(
                    "repository_connectivity",
                    CheckStatus::Skipped,
                    "skipped because the repository url is invalid",
                ),
            ];
        }
    };

    let RepositoryHandles { slug: Some(slug), repository: Some(repository), approver } = handles
    else {
        return [
            DoctorCheck::new(
                "repository_mode",
                CheckStatus::Skipped,
                "no repository url and token configured; restarts are simulated",
            ),
            DoctorCheck::new(
                "repository_connectivity",
                CheckStatus::Skipped,
                "skipped in simulated mode",
            ),
        ];
    };

    let approval = if approver.is_some() { "with approver" } else { "without approver" };
    let mode = DoctorCheck::new(
        "repository_mode",
        CheckStatus::Pass,
        format!("live against `{slug}` {approval}"),
    );

    let trunk = &config.repository.trunk_branch;
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return [
                mode,
                DoctorCheck::new(
                    "repository_connectivity",
                    CheckStatus::Fail,
                    format!("failed to initialize async runtime: {error}"),
                ),
            ];
        }
    };

    let connectivity = match runtime.block_on(repository.branch_head(trunk)) {
        Ok(sha) => DoctorCheck::new(
            "repository_connectivity",
            CheckStatus::Pass,
            format!("`{trunk}` resolves to {sha}"),
        ),
        Err(error) => DoctorCheck::new(
            "repository_connectivity",
            CheckStatus::Fail,
            format!("could not resolve `{trunk}`: {error}"),
        ),
    };

    [mode, connectivity]
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
