//! Kolosal Features - Main Entry Point
//!
//! Derives calendar, rolling-window and lag features from a time-indexed file.

use clap::Parser;
use kolosal_features::cli::{cmd_inspect, cmd_transform, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_features=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transform { data, time_column, spec, output, rows, threads } => {
            cmd_transform(&data, &time_column, &spec, output.as_deref(), rows, threads)?;
        }
        Commands::Inspect { data, time_column, step } => {
            cmd_inspect(&data, &time_column, step.as_deref())?;
        }
    }

    Ok(())
}
