//! debgo CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use debgo_cli::{Cli, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the timestamp.
    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let timestamp = cmd::build::build(&cli).await?;
    println!("{timestamp}");
    Ok(())
}
