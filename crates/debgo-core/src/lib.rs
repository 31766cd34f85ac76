//! Core library for debgo.
//!
//! Turns a Debian archive release into a Go source tree: the [`archive`]
//! client resolves release metadata and fetches verified files, [`index`]
//! selects the Go source packages, [`assembler`] lays each one out under a
//! staging root and [`workspace`] publishes the result as a timestamped
//! snapshot.

pub mod archive;
pub mod assembler;
pub mod debhelper;
pub mod index;
pub mod io;
pub mod paths;
pub mod reporter;
pub mod tables;
pub mod toolbox;
pub mod workspace;

pub use archive::{Archive, HttpArchive, ReleaseMetadata};
pub use paths::*;
pub use reporter::{LogReporter, NullReporter, Reporter};
pub use tables::PackageTables;
pub use toolbox::{SystemTools, Toolbox};
pub use workspace::{RunOutcome, Workspace, WorkspaceError};

/// User Agent string for archive requests
pub const USER_AGENT: &str = concat!("debgo/", env!("CARGO_PKG_VERSION"));
