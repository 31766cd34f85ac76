//! Build command

use std::sync::Arc;

use anyhow::{Context, Result};
use debgo_core::io::download::RetryPolicy;
use debgo_core::{HttpArchive, LogReporter, PackageTables, RunOutcome, SystemTools, Workspace};

/// Assemble (or find) the snapshot of the configured release and return
/// its timestamp.
pub async fn build(cli: &crate::Cli) -> Result<i64> {
    let tables = match &cli.tables {
        Some(path) => PackageTables::load(path)
            .with_context(|| format!("Failed to load package tables from {}", path.display()))?,
        None => PackageTables::default(),
    };

    let policy = RetryPolicy {
        retries: cli.retries,
        ..RetryPolicy::default()
    };
    let archive = HttpArchive::new(&cli.mirror, policy).context("Failed to set up HTTP client")?;
    let tools = SystemTools::detect()?;

    tracing::info!(
        mirror = archive.mirror(),
        release = %cli.release,
        output = %cli.output_dir.display(),
        "building Go source tree"
    );

    let workspace = Workspace::new(
        Arc::new(archive),
        Arc::new(tools),
        cli.release.as_str(),
        cli.output_dir.as_path(),
    )
    .with_tables(tables)
    .with_jobs(cli.jobs as usize)
    .with_reporter(Arc::new(LogReporter));

    let outcome = workspace
        .run()
        .await
        .with_context(|| format!("Failed to build release '{}'", cli.release))?;

    if let RunOutcome::Published { path, .. } = &outcome {
        tracing::info!(path = %path.display(), "published");
    }
    Ok(outcome.timestamp())
}
