//! Package tables: which source packages to ignore and where to place them.
//!
//! The built-in tables cover archive entries whose declared import path is
//! missing or wrong. A TOML document can override any of them:
//!
//! ```toml
//! ignored = ["kxd"]
//! exclusions = ["docker-containerd"]
//! markers = ["golang-go", "golang-any", "golang"]
//!
//! [rewrites]
//! pluginhook = "github.com/progrium/pluginhook"
//! ```
//!
//! Tables absent from the document keep their built-in contents.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use debgo_schema::{ImportPath, ImportPathError, SourcePackage};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TablesError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid package tables: {0}")]
    Parse(#[from] toml::de::Error),
}

const IGNORED: &[&str] = &[
    "kxd",
    "golang-1.6",
    "golang-1.7",
    "golang-1.8",
    "golang-1.9",
    "golang-1.10",
];

const REWRITES: &[(&str, &str)] = &[
    ("gitlab-workhorse", "gitlab.com/gitlab-org/gitlab-workhorse"),
    ("pluginhook", "github.com/progrium/pluginhook"),
    ("golang-github-gosexy-gettext", "github.com/gosexy/gettext"),
    ("mongo-tools", "github.com/mongodb/mongo-tools"),
    (
        "golang-github-mvo5-goconfigparser",
        "github.com/mvo5/goconfigparser",
    ),
];

const EXCLUSIONS: &[&str] = &["golang-github-dnephin-cobra", "docker-containerd"];

const MARKERS: &[&str] = &["golang-go", "golang-any", "golang"];

/// Injected selection and placement tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageTables {
    /// Source packages never assembled (toolchains, non-library packages).
    pub ignored: BTreeSet<String>,
    /// Package name to import path, overriding any declared path.
    pub rewrites: BTreeMap<String, String>,
    /// Known-broken packages dropped from the index.
    pub exclusions: BTreeSet<String>,
    /// Build dependencies that mark a package as Go source.
    pub markers: BTreeSet<String>,
}

impl Default for PackageTables {
    fn default() -> Self {
        let set = |names: &[&str]| names.iter().map(|s| (*s).to_string()).collect();
        Self {
            ignored: set(IGNORED),
            rewrites: REWRITES
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            exclusions: set(EXCLUSIONS),
            markers: set(MARKERS),
        }
    }
}

impl PackageTables {
    /// Parse tables from a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, TablesError> {
        Ok(toml::from_str(text)?)
    }

    /// Read tables from a TOML file.
    pub fn load(path: &Path) -> Result<Self, TablesError> {
        let text = std::fs::read_to_string(path).map_err(|source| TablesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Whether a record is dropped by name before any other check.
    pub fn is_dropped(&self, name: &str) -> bool {
        self.ignored.contains(name) || self.exclusions.contains(name)
    }

    /// Whether a record describes Go source: a declared import path or a
    /// Go toolchain build dependency.
    pub fn is_go_source(&self, src: &SourcePackage) -> bool {
        !src.import_path_hint.trim().is_empty()
            || src.build_depends.iter().any(|d| self.markers.contains(d))
    }

    /// Destination import path of a record.
    ///
    /// A rewrite entry wins over the declared `Go-Import-Path`.
    pub fn import_path(&self, src: &SourcePackage) -> Result<ImportPath, ImportPathError> {
        match self.rewrites.get(src.name.as_str()) {
            Some(path) => ImportPath::parse(path),
            None => ImportPath::parse(&src.import_path_hint),
        }
    }
}
