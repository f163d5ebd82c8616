use hubot_audit_cli::{run_cli, CliError};
use tracing::error;

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("hubot-audit: {}", e);

        // Exit with appropriate code based on error type
        let exit_code = match e {
            CliError::Configuration(_) => 1,
            CliError::IndexClient(_) => 2,
            CliError::InvalidInput { .. } => 3,
            CliError::Io(_) => 4,
            CliError::Logging { .. } => 5,
            CliError::Output { .. } => 6,
        };

        std::process::exit(exit_code);
    }
}
