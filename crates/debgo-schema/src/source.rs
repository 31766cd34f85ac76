//! Source package records decoded from a `Sources` index paragraph.

use serde::Deserialize;
use thiserror::Error;

use crate::control::checksum_table;
use crate::types::{FileHash, PackageName};
use crate::version::{DebVersion, VersionError};

/// Errors raised when a paragraph is not a usable source package record.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A mandatory field is absent.
    #[error("src:{package}: missing field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// Package name, `?` when the name itself is missing.
        package: String,
    },

    /// The `Version` field does not parse.
    #[error("src:{package}: {source}")]
    Version {
        /// Package name.
        package: String,
        /// Parse failure.
        source: VersionError,
    },

    /// A `Checksums-Sha256` entry is malformed.
    #[error("src:{package}: malformed checksum entry '{line}'")]
    Checksum {
        /// Package name.
        package: String,
        /// Offending entry.
        line: String,
    },
}

/// The `Sources` fields debgo reads, exactly as written in the index.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SourceRecord {
    /// `Package`.
    pub package: Option<String>,
    /// `Version`.
    pub version: Option<String>,
    /// `Directory`.
    pub directory: Option<String>,
    /// `Build-Depends`.
    #[serde(rename = "Build-Depends")]
    pub build_depends: Option<String>,
    /// `Go-Import-Path`.
    #[serde(rename = "Go-Import-Path")]
    pub go_import_path: Option<String>,
    /// `Extra-Source-Only`.
    #[serde(rename = "Extra-Source-Only")]
    pub extra_source_only: Option<String>,
    /// `Checksums-Sha256`.
    #[serde(rename = "Checksums-Sha256")]
    pub checksums_sha256: Option<String>,
}

/// One versioned source package entry of the archive index.
#[derive(Debug, Clone)]
pub struct SourcePackage {
    /// Source package name.
    pub name: PackageName,
    /// Source version.
    pub version: DebVersion,
    /// Pool directory holding the package files (e.g. `pool/main/g/golang-foo`).
    pub directory: String,
    /// Names of every build dependency, alternatives included.
    pub build_depends: Vec<String>,
    /// Declared Go import path(s); empty when not declared.
    pub import_path_hint: String,
    /// Entry kept only to satisfy source-availability requirements.
    pub extra_source_only: bool,
    /// Files belonging to this version, in index order.
    pub artifacts: Vec<FileHash>,
}

impl SourcePackage {
    /// Validate a decoded `Sources` record.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when `Package`, `Version` or `Directory` is
    /// missing, the version does not parse, or a checksum entry is malformed.
    pub fn from_record(record: &SourceRecord) -> Result<Self, SourceError> {
        let name = record
            .package
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SourceError::MissingField {
                field: "Package",
                package: "?".to_string(),
            })?;
        let missing = |field| SourceError::MissingField {
            field,
            package: name.to_string(),
        };

        let version = record.version.as_deref().ok_or_else(|| missing("Version"))?;
        let version = DebVersion::parse(version.trim()).map_err(|source| SourceError::Version {
            package: name.to_string(),
            source,
        })?;
        let directory = record
            .directory
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| missing("Directory"))?;

        let artifacts = record
            .checksums_sha256
            .as_deref()
            .map(checksum_table)
            .transpose()
            .map_err(|line| SourceError::Checksum {
                package: name.to_string(),
                line,
            })?
            .unwrap_or_default();

        Ok(Self {
            name: PackageName::new(name),
            version,
            directory: directory.to_string(),
            build_depends: record
                .build_depends
                .as_deref()
                .map(dependency_names)
                .unwrap_or_default(),
            import_path_hint: record
                .go_import_path
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
            extra_source_only: record
                .extra_source_only
                .as_deref()
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("yes")),
            artifacts,
        })
    }
}

/// Extract every package name from a dependency field.
///
/// Alternatives (`a | b`) are all returned; version constraints,
/// architecture qualifiers, build profiles and `:any` suffixes are dropped.
pub fn dependency_names(field: &str) -> Vec<String> {
    field
        .split(',')
        .flat_map(|relation| relation.split('|'))
        .filter_map(|possibility| {
            let possibility = possibility.trim();
            let end = possibility
                .find(|c: char| c.is_whitespace() || matches!(c, '(' | '[' | '<' | ':'))
                .unwrap_or(possibility.len());
            let name = &possibility[..end];
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}
