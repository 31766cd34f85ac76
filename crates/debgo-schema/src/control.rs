//! deb822 decoding.
//!
//! Archive indices (`Release`, `Sources`) are sequences of paragraphs
//! separated by blank lines. Each paragraph is decoded through
//! [`rfc822_like`] into a serde record whose fields carry the Debian names
//! (`Checksums-Sha256`, `Go-Import-Path`, ...). Fields a record does not
//! name are ignored.

use std::io::{self, Read};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::hash::Sha256Hash;
use crate::types::FileHash;

/// Errors raised while decoding a deb822 document.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Underlying read failure (including invalid UTF-8).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The document is not well-formed deb822, or a paragraph does not fit
    /// the record type (e.g. a field given twice).
    #[error("malformed deb822 document: {0}")]
    Syntax(String),
}

/// Decode every paragraph of an in-memory document.
///
/// # Errors
///
/// Returns the first [`ControlError`] encountered; no partial result is
/// returned.
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ControlError> {
    rfc822_like::from_str(text).map_err(|e| ControlError::Syntax(e.to_string()))
}

/// Read a whole document from `reader` and decode it.
///
/// # Errors
///
/// Returns [`ControlError::Io`] when reading fails and
/// [`ControlError::Syntax`] when decoding does.
pub fn from_reader<T: DeserializeOwned, R: Read>(mut reader: R) -> Result<Vec<T>, ControlError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    from_str(&text)
}

/// Decode a `hash size name` checksum table (`Checksums-Sha256`, `SHA256`).
///
/// # Errors
///
/// Returns the offending entry when an entry is incomplete, its size is not
/// a number or its hash is not SHA-256 hex.
pub fn checksum_table(field: &str) -> Result<Vec<FileHash>, String> {
    let tokens: Vec<&str> = field.split_whitespace().collect();
    tokens
        .chunks(3)
        .map(|entry| {
            let malformed = || entry.join(" ");
            let [hash, size, filename] = entry else {
                return Err(malformed());
            };
            Ok(FileHash {
                filename: (*filename).to_string(),
                size: size.parse().map_err(|_| malformed())?,
                sha256: Sha256Hash::validated(hash).map_err(|_| malformed())?,
            })
        })
        .collect()
}
