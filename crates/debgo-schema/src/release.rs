//! `Release` documents (`dists/<release>/Release`).

use serde::Deserialize;

/// The `Release` fields debgo reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReleaseRecord {
    /// `Suite`, e.g. `unstable`.
    #[serde(rename = "Suite")]
    pub suite: Option<String>,
    /// `Date`, RFC 2822.
    #[serde(rename = "Date")]
    pub date: Option<String>,
    /// `SHA256` checksum table of the index files.
    #[serde(rename = "SHA256")]
    pub sha256: Option<String>,
}
