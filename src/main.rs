//! Fraudscope - Main Entry Point
//!
//! Trains the detector once at startup, then serves the upload page or scores
//! a file from the terminal.

use clap::Parser;
use fraudscope::cli::{cmd_info, cmd_score, cmd_serve, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudscope=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { training, host, port, config }) => {
            cmd_serve(training, host, port, config).await?;
        }
        Some(Commands::Score { training, data, config, output }) => {
            cmd_score(training, &data, config, output.as_deref())?;
        }
        Some(Commands::Info { data, label }) => {
            cmd_info(&data, &label)?;
        }
        None => {
            // Default: serve with environment configuration
            cmd_serve(None, None, None, None).await?;
        }
    }

    Ok(())
}
