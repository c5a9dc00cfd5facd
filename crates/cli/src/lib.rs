pub mod bootstrap;
pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use relaunch_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "relaunch",
    about = "Conversational application restart agent",
    long_about = "Turn a free-form restart command into a reviewed, merged configuration change.",
    after_help = "Examples:\n  relaunch\n  relaunch run --command \"Restart Acme Corporation dv01 cbp\"\n  relaunch doctor --json"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Path to relaunch.toml (defaults to ./relaunch.toml or ./config/relaunch.toml)"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Read one command (from --command or stdin) and run the agent loop")]
    Run {
        #[arg(long, help = "Command text; prompts on stdin when omitted")]
        command: Option<String>,
    },
    #[command(about = "Check configuration, credentials and registry readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    // A missing .env is normal; explicit environment variables still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let result = match cli.command.unwrap_or(Command::Run { command: None }) {
        Command::Run { command } => commands::run::run(options, command),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(options, json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
