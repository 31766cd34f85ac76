use std::path::{Path, PathBuf};

/// Prefix of private staging directories created next to snapshots.
pub const STAGING_PREFIX: &str = "src-tmp-";

/// Packaging metadata directory inside each package subtree.
pub const PACKAGING_DIR: &str = "packaging";

/// Provenance manifest, relative to the packaging directory.
pub const HASHES_FILE: &str = ".hashes";

/// Directory name of the snapshot published for `timestamp`.
pub fn snapshot_name(timestamp: i64) -> String {
    format!("src-{timestamp}")
}

/// Snapshot path: <output>/src-<timestamp>
pub fn snapshot_path(output_dir: &Path, timestamp: i64) -> PathBuf {
    output_dir.join(snapshot_name(timestamp))
}

/// Packaging path: <package dir>/packaging
pub fn packaging_path(package_dir: &Path) -> PathBuf {
    package_dir.join(PACKAGING_DIR)
}

/// Mirror URL of an archive-relative file.
pub fn mirror_url(mirror: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        mirror.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
