//! Reporter trait for dependency injection
//!
//! Assembly reports per-package progress through this trait so the core
//! logic stays independent of how (or whether) it is displayed.

use debgo_schema::{DebVersion, PackageName};

pub trait Reporter: Send + Sync {
    /// A new phase of the run has started (e.g. "Loading index").
    fn section(&self, title: &str);

    /// An artifact of a package is being retrieved.
    fn fetching(&self, name: &PackageName, version: &DebVersion, artifact: &str);

    /// A package has entered an assembly step.
    fn step(&self, name: &PackageName, version: &DebVersion, step: &str);

    /// A package has been laid out under the staging root.
    fn done(&self, name: &PackageName, version: &DebVersion, import_path: &str);

    /// A package was left out for a non-fatal reason.
    fn skipped(&self, name: &PackageName, version: &DebVersion, reason: &str);

    /// A package failed in a way that fails the run.
    fn failed(&self, name: &PackageName, version: &DebVersion, reason: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Display a final summary of the run.
    fn summary(&self, assembled: usize, skipped: usize, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn fetching(&self, name: &PackageName, version: &DebVersion, artifact: &str) {
        (**self).fetching(name, version, artifact);
    }
    fn step(&self, name: &PackageName, version: &DebVersion, step: &str) {
        (**self).step(name, version, step);
    }
    fn done(&self, name: &PackageName, version: &DebVersion, import_path: &str) {
        (**self).done(name, version, import_path);
    }
    fn skipped(&self, name: &PackageName, version: &DebVersion, reason: &str) {
        (**self).skipped(name, version, reason);
    }
    fn failed(&self, name: &PackageName, version: &DebVersion, reason: &str) {
        (**self).failed(name, version, reason);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, assembled: usize, skipped: usize, elapsed_secs: f64) {
        (**self).summary(assembled, skipped, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn fetching(&self, _: &PackageName, _: &DebVersion, _: &str) {}
    fn step(&self, _: &PackageName, _: &DebVersion, _: &str) {}
    fn done(&self, _: &PackageName, _: &DebVersion, _: &str) {}
    fn skipped(&self, _: &PackageName, _: &DebVersion, _: &str) {}
    fn failed(&self, _: &PackageName, _: &DebVersion, _: &str) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: usize, _: usize, _: f64) {}
}

/// Reporter that forwards everything to `tracing`.
///
/// Routine progress goes to `debug`, outcomes to `info`/`warn`/`error`, so
/// the default filter shows one line per package.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn section(&self, title: &str) {
        tracing::info!("{title}");
    }

    fn fetching(&self, name: &PackageName, version: &DebVersion, artifact: &str) {
        tracing::debug!(package = %name, %version, artifact, "fetching");
    }

    fn step(&self, name: &PackageName, version: &DebVersion, step: &str) {
        tracing::debug!(package = %name, %version, step, "assembling");
    }

    fn done(&self, name: &PackageName, version: &DebVersion, import_path: &str) {
        tracing::info!(package = %name, %version, import_path, "assembled");
    }

    fn skipped(&self, name: &PackageName, version: &DebVersion, reason: &str) {
        tracing::warn!(package = %name, %version, reason, "skipped");
    }

    fn failed(&self, name: &PackageName, version: &DebVersion, reason: &str) {
        tracing::error!(package = %name, %version, reason, "failed");
    }

    fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn summary(&self, assembled: usize, skipped: usize, elapsed_secs: f64) {
        tracing::info!(
            assembled,
            skipped,
            "assembled {assembled} packages ({skipped} skipped) in {elapsed_secs:.1}s"
        );
    }
}
