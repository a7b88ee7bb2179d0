use clap::Parser;
use patchstack::cli::output::Output;
use patchstack::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        // Halts have already been reported with their conflicts
        Err(err @ patchstack::StackError::Halted(_)) => ExitCode::from(err.exit_code()),
        Err(err) => {
            Output::error(&err);
            ExitCode::from(err.exit_code())
        }
    }
}
