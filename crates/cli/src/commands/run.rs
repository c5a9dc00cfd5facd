use std::io::{self, BufRead, Write};
use std::sync::Arc;

use relaunch_agent::{ActionRequest, LoopObserver, RuntimeError, Termination};
use relaunch_core::config::{AppConfig, LoadOptions};
use serde_json::json;

use crate::bootstrap::{build_runtime, init_logging};
use crate::commands::CommandResult;

const COMMAND: &str = "run";
const SEPARATOR: &str = "----------------------";

/// Echoes loop progress to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleObserver;

impl LoopObserver for ConsoleObserver {
    fn turn_started(&self, turn: u32) {
        println!("Loop: {turn}");
        println!("{SEPARATOR}");
    }

    fn model_replied(&self, reply: &str) {
        println!("{reply}");
    }

    fn action_started(&self, request: &ActionRequest) {
        println!(" -- running {} {:?}", request.function_name, request.function_parms);
    }

    fn action_completed(&self, response: &str) {
        println!("Action_Response: {response}");
    }
}

pub fn run(options: LoadOptions, command: Option<String>) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };
    init_logging(&config);

    let command = match command {
        Some(command) => command,
        None => match prompt_for_command() {
            Ok(command) => command,
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "input",
                    format!("could not read command: {error}"),
                    2,
                );
            }
        },
    };
    let command = command.trim();
    if command.is_empty() {
        return CommandResult::failure(COMMAND, "input", "command must not be empty", 2);
    }

    run_command(&config, command, Arc::new(ConsoleObserver))
}

pub fn run_command(
    config: &AppConfig,
    command: &str,
    observer: Arc<dyn LoopObserver>,
) -> CommandResult {
    let agent = match build_runtime(config, observer) {
        Ok(agent) => agent,
        Err(error) => return CommandResult::failure(COMMAND, "bootstrap", error.to_string(), 2),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    match runtime.block_on(agent.run(command)) {
        Ok(report) => {
            let termination = match report.termination {
                Termination::Answered => "answered",
                Termination::BudgetExhausted => "budget_exhausted",
            };
            CommandResult::success(
                COMMAND,
                report.answer,
                Some(json!({ "turns": report.turns, "termination": termination })),
            )
        }
        Err(error @ RuntimeError::Dispatch(_)) => {
            CommandResult::failure(COMMAND, "dispatch", error.to_string(), 1)
        }
        Err(error @ RuntimeError::Completion(_)) => {
            CommandResult::failure(COMMAND, "completion", error.to_string(), 1)
        }
    }
}

fn prompt_for_command() -> io::Result<String> {
    print!("Enter your command: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}
