//! Archive access: release metadata and verified file retrieval.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use debgo_schema::control::{self, checksum_table};
use debgo_schema::{FileHash, ReleaseRecord};
use reqwest::Client;
use tempfile::NamedTempFile;

use crate::io::download::{self, FetchError, RetryPolicy};
use crate::paths::mirror_url;

/// What a release publishes: when it last changed and which index files
/// it lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMetadata {
    /// Release (suite or codename) name, e.g. `unstable`.
    pub name: String,
    /// Last modification time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Index files keyed by their path inside the release directory
    /// (`main/source/Sources.gz`); handles are mirror-relative.
    pub indices: HashMap<String, FileHash>,
}

#[async_trait]
pub trait Archive: Send + Sync {
    /// Resolve the metadata of a release.
    async fn release(&self, name: &str) -> Result<ReleaseMetadata, FetchError>;

    /// Download a mirror-relative file into a temporary file, verifying its
    /// SHA-256. The file is deleted when the handle is dropped.
    async fn fetch_to_temp(&self, file: &FileHash) -> Result<NamedTempFile, FetchError>;
}

/// A Debian mirror reached over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpArchive {
    client: Client,
    mirror: String,
    policy: RetryPolicy,
    temp_dir: Option<PathBuf>,
}

impl HttpArchive {
    /// Build a client for `mirror` (e.g. `http://deb.debian.org/debian`).
    pub fn new(mirror: &str, policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            mirror: mirror.trim_end_matches('/').to_string(),
            policy,
            temp_dir: None,
        })
    }

    /// Place downloaded temporaries in `dir` instead of the system default.
    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Mirror base URL, without trailing slash.
    pub fn mirror(&self) -> &str {
        &self.mirror
    }
}

#[async_trait]
impl Archive for HttpArchive {
    async fn release(&self, name: &str) -> Result<ReleaseMetadata, FetchError> {
        let url = mirror_url(&self.mirror, &format!("dists/{name}/Release"));
        let (text, last_modified) =
            download::with_retries(self.policy, &url, || download::fetch_text(&self.client, &url))
                .await?;

        let release = parse_release(name, &text, last_modified.as_deref()).map_err(|message| {
            FetchError::InvalidRelease {
                url: url.clone(),
                message,
            }
        })?;
        tracing::debug!(
            release = name,
            timestamp = release.timestamp,
            indices = release.indices.len(),
            "resolved release"
        );
        Ok(release)
    }

    async fn fetch_to_temp(&self, file: &FileHash) -> Result<NamedTempFile, FetchError> {
        let url = mirror_url(&self.mirror, &file.filename);
        let temp = match &self.temp_dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        tracing::debug!(%url, size = file.size, "fetching");
        download::with_retries(self.policy, &url, || {
            download::download_and_verify(&self.client, &url, temp.path(), &file.sha256)
        })
        .await?;

        Ok(temp)
    }
}

/// Decode a `Release` document.
///
/// The timestamp comes from the HTTP `Last-Modified` header when present,
/// otherwise from the document's `Date` field.
pub fn parse_release(
    name: &str,
    text: &str,
    last_modified: Option<&str>,
) -> Result<ReleaseMetadata, String> {
    let record = control::from_str::<ReleaseRecord>(text)
        .map_err(|e| e.to_string())?
        .into_iter()
        .next()
        .ok_or("empty document")?;

    let timestamp = last_modified
        .and_then(parse_http_date)
        .or_else(|| record.date.as_deref().and_then(parse_http_date))
        .ok_or("no Last-Modified header and no parseable Date field")?
        .timestamp();

    let table = record.sha256.as_deref().ok_or("missing SHA256 field")?;
    let indices: HashMap<String, FileHash> = checksum_table(table)
        .map_err(|entry| format!("malformed SHA256 entry '{entry}'"))?
        .into_iter()
        .map(|file| {
            let path = file.filename.clone();
            let handle = FileHash {
                filename: format!("dists/{name}/{path}"),
                ..file
            };
            (path, handle)
        })
        .collect();

    Ok(ReleaseMetadata {
        name: name.to_string(),
        timestamp,
        indices,
    })
}

/// RFC 2822 dates as used by HTTP headers and `Release` files.
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = value
        .strip_suffix(" UTC")
        .map_or_else(|| value.to_string(), |v| format!("{v} +0000"));
    DateTime::parse_from_rfc2822(&value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
