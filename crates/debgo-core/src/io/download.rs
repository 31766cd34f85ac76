//! Verified downloads with retry of transient failures.
//!
//! Bodies are streamed to disk while being hashed; a file whose SHA-256
//! differs from the published one is removed and reported. Connection
//! errors, timeouts and 5xx responses are retried with linear back-off, a
//! hash mismatch never is.

use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use debgo_schema::Sha256Hash;
use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP client setup failed: {0}")]
    Client(reqwest::Error),

    #[error("HTTP error fetching {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash mismatch for {file}: expected {expected}, got {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid Release file at {url}: {message}")]
    InvalidRelease { url: String, message: String },
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => {
                source.is_connect()
                    || source.is_timeout()
                    || source.is_body()
                    || source.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }

    fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }
}

/// How often and how patiently transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay unit; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    url: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.retries => {
                attempt += 1;
                tracing::warn!(url, attempt, retries = policy.retries, "{e}, retrying");
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            result => return result,
        }
    }
}

/// Fetch a small text document.
pub async fn fetch_text(client: &Client, url: &str) -> Result<(String, Option<String>), FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| FetchError::http(url, e))?;

    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = response.text().await.map_err(|e| FetchError::http(url, e))?;

    Ok((text, last_modified))
}

/// Stream `url` into `dest`, verifying the SHA-256 on the way.
///
/// On mismatch `dest` is removed and [`FetchError::HashMismatch`] returned.
pub async fn download_and_verify(
    client: &Client,
    url: &str,
    dest: &Path,
    expected: &Sha256Hash,
) -> Result<(), FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| FetchError::http(url, e))?;

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::http(url, e))?;
        file.write_all(&chunk).await?;
        hasher.write_all(&chunk)?;
    }

    file.flush().await?;
    let actual = hex::encode(hasher.finalize());

    if actual != expected.as_str() {
        tokio::fs::remove_file(dest).await.ok();
        return Err(FetchError::HashMismatch {
            file: url.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}
