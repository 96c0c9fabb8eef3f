mod commands;
mod helpers;

use clap::Parser;
use mod6_core::domain::{CaseError, ErrorCategory};
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    init_logging();
    let args = std::env::args().collect::<Vec<_>>();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}", error.diagnostic_line());
            eprintln!("{}", error.fatal_exit_line());
            error.exit_code()
        }
    }
}

/// Events go to stderr so stdout carries only command output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string().trim_end().to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "mod6-rs", version, about = "Run MODTRAN cases and collect their outputs")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run one case document and report its decoded outputs
    Run(commands::RunArgs),
    /// Run several case documents under a bounded worker pool
    Batch(commands::BatchArgs),
    /// Check case documents without running the engine
    Validate(commands::ValidateArgs),
    /// Print the engine release
    Version(commands::EngineArgs),
    /// Print the engine license status
    License(commands::EngineArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_run_command(args),
        CliCommand::Batch(args) => commands::run_batch_command(args),
        CliCommand::Validate(args) => commands::run_validate_command(args),
        CliCommand::Version(args) => commands::run_version_command(args),
        CliCommand::License(args) => commands::run_license_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Case(#[from] CaseError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => ErrorCategory::InputValidationError.exit_code(),
            Self::Case(error) => error.exit_code(),
            Self::Internal(_) => ErrorCategory::IoSystemError.exit_code(),
        }
    }

    fn diagnostic_line(&self) -> String {
        match self {
            Self::Usage(message) => format!("ERROR: [INPUT.CLI_USAGE] {message}"),
            Self::Case(error) => error.diagnostic_line(),
            Self::Internal(error) => format!("ERROR: [IO.CLI] {error:#}"),
        }
    }

    fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}
