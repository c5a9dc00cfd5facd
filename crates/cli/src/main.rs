use std::process::ExitCode;

fn main() -> ExitCode {
    relaunch_cli::run()
}
