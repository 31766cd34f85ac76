//! Package names, file handles and Go import paths.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::path::{Component, Path};

use crate::hash::Sha256Hash;

/// A Debian source package name (e.g. `golang-github-spf13-cobra`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name, normalizing the input to lowercase.
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<PackageName> for String {
    fn from(name: PackageName) -> Self {
        name.0
    }
}

/// A file published by the archive, addressed relative to the mirror root.
///
/// Used both for index files listed in a release (`dists/<release>/...`) and
/// for the per-package artifacts listed in `Checksums-Sha256`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    /// Path relative to the mirror root (or to the source package directory
    /// before it has been joined with `Directory`).
    pub filename: String,
    /// Size in bytes as published.
    pub size: u64,
    /// Expected SHA-256 of the content.
    pub sha256: Sha256Hash,
}

impl FileHash {
    /// Return a copy addressed under `directory` (e.g. `pool/main/g/golang-foo`).
    pub fn joined(&self, directory: &str) -> Self {
        let directory = directory.trim_end_matches('/');
        let filename = if directory.is_empty() {
            self.filename.clone()
        } else {
            format!("{directory}/{}", self.filename)
        };
        Self {
            filename,
            size: self.size,
            sha256: self.sha256.clone(),
        }
    }

    /// Final path component of the filename.
    pub fn basename(&self) -> &str {
        self.filename.rsplit('/').next().unwrap_or(&self.filename)
    }
}

/// Errors raised when an import path cannot be used as a destination.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ImportPathError {
    /// The path (or its first comma-separated component) is empty.
    #[error("empty import path")]
    Empty,

    /// The path would escape or ignore the workspace root.
    #[error("import path '{0}' is not a plain relative path")]
    NotRelative(String),
}

/// The primary Go import path of a package, usable as a relative directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportPath(String);

impl ImportPath {
    /// Parse a (possibly multi-valued) import path declaration.
    ///
    /// Packages providing several module paths list them comma-separated;
    /// only the first one decides placement.
    ///
    /// # Errors
    ///
    /// Returns [`ImportPathError::Empty`] for an empty first component and
    /// [`ImportPathError::NotRelative`] for absolute paths or paths containing
    /// `.`/`..` components.
    pub fn parse(declared: &str) -> Result<Self, ImportPathError> {
        let primary = declared.split(',').next().unwrap_or_default().trim();
        let primary = primary.trim_end_matches('/');
        if primary.is_empty() {
            return Err(ImportPathError::Empty);
        }

        let plain = !primary.starts_with('/')
            && primary.split('/').all(|c| !c.is_empty() && c != "." && c != "..")
            && Path::new(primary)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(ImportPathError::NotRelative(primary.to_string()));
        }

        Ok(Self(primary.to_string()))
    }

    /// Return the import path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for ImportPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl std::fmt::Display for ImportPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
