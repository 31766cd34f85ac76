//! debgo - Debian archive to Go source tree
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Assembles every Go source package of a Debian release into a single
//! tree laid out by import path, published as an immutable snapshot.
//!
//! # Output Layout
//!
//! ```text
//! <output-dir>/
//! └── src-<timestamp>/            # one per release timestamp
//!     └── github.com/foo/bar/     # upstream sources, patched
//!         └── packaging/          # Debian packaging metadata
//!             └── .hashes         # tarball provenance
//! ```
//!
//! On success the timestamp, and nothing else, is printed on stdout.

pub mod cmd;

use clap::Parser;
use std::path::PathBuf;

pub use debgo_core::USER_AGENT;

#[derive(Debug, Parser)]
#[command(name = "debgo")]
#[command(author, version = env!("DEBGO_VERSION"))]
#[command(about = "debgo - assemble a Go source tree from a Debian archive")]
pub struct Cli {
    /// Debian mirror base URL
    #[arg(
        long,
        env = "DEBGO_MIRROR",
        default_value = "http://localhost:3142/deb.debian.org/debian"
    )]
    pub mirror: String,

    /// Release (suite or codename) to assemble
    #[arg(long, env = "DEBGO_RELEASE", default_value = "unstable")]
    pub release: String,

    /// Directory receiving src-<timestamp> snapshots
    #[arg(long, env = "DEBGO_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Packages assembled concurrently
    #[arg(
        short,
        long,
        env = "DEBGO_JOBS",
        default_value_t = 20,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub jobs: u32,

    /// Retries for transient download failures
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// TOML file overriding the ignore/rewrite/exclusion tables
    #[arg(long)]
    pub tables: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}
