//! Source index loading.
//!
//! Decodes the `Sources` paragraphs of a release and keeps the newest
//! version of every Go source package. Any decoding failure rejects the
//! whole index; no partial result is produced.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use debgo_schema::control;
use debgo_schema::{
    ControlError, FileHash, PackageName, SourceError, SourcePackage, SourceRecord,
};
use flate2::read::GzDecoder;
use thiserror::Error;

use crate::archive::ReleaseMetadata;
use crate::tables::PackageTables;

/// Gzip-compressed source index, relative to the release directory.
pub const SOURCES_GZ: &str = "main/source/Sources.gz";

/// Uncompressed source index, relative to the release directory.
pub const SOURCES_PLAIN: &str = "main/source/Sources";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("release '{release}' lists neither {SOURCES_GZ} nor {SOURCES_PLAIN}")]
    Missing { release: String },

    #[error("failed to decode source index: {0}")]
    Control(#[from] ControlError),

    #[error("invalid source record: {0}")]
    Record(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Encoding of the selected index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Gzip,
    Plain,
}

/// Pick the source index of a release, preferring the compressed one.
pub fn select_index(release: &ReleaseMetadata) -> Result<(FileHash, IndexFormat), IndexError> {
    if let Some(file) = release.indices.get(SOURCES_GZ) {
        return Ok((file.clone(), IndexFormat::Gzip));
    }
    if let Some(file) = release.indices.get(SOURCES_PLAIN) {
        return Ok((file.clone(), IndexFormat::Plain));
    }
    Err(IndexError::Missing {
        release: release.name.clone(),
    })
}

/// Load a downloaded index file.
pub fn load_index_file(
    path: &Path,
    format: IndexFormat,
    tables: &PackageTables,
) -> Result<Vec<SourcePackage>, IndexError> {
    let file = File::open(path)?;
    match format {
        IndexFormat::Gzip => load_sources(BufReader::new(GzDecoder::new(file)), tables),
        IndexFormat::Plain => load_sources(BufReader::new(file), tables),
    }
}

/// Decode a `Sources` document into the Go source packages to assemble.
///
/// Drops extra-source-only entries, ignored and excluded names, and records
/// that neither declare an import path nor build-depend on a Go toolchain.
/// For each name only the highest version survives. Output is sorted by
/// name.
pub fn load_sources<R: Read>(
    reader: R,
    tables: &PackageTables,
) -> Result<Vec<SourcePackage>, IndexError> {
    let mut newest: BTreeMap<PackageName, SourcePackage> = BTreeMap::new();
    let mut total = 0usize;

    for record in control::from_reader::<SourceRecord, _>(reader)? {
        let src = SourcePackage::from_record(&record)?;
        total += 1;

        if src.extra_source_only || tables.is_dropped(&src.name) || !tables.is_go_source(&src) {
            continue;
        }

        match newest.get(&src.name) {
            Some(existing) if existing.version >= src.version => {}
            _ => {
                newest.insert(src.name.clone(), src);
            }
        }
    }

    tracing::debug!(total, selected = newest.len(), "loaded source index");
    Ok(newest.into_values().collect())
}
