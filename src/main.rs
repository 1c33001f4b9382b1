//! dbcontext - catalog metadata and object context extraction
//!
//! This is the main entry point for the dbcontext binary.
//! The actual logic is in the library modules for better testability.

use anyhow::Result;
use clap::Parser;
use dbcontext::commands::{self, Cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    Ok(commands::run(cli).await)
}

/// Logs go to stderr; stdout and the out file carry results
fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dbcontext={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}
