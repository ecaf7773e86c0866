//! Reference table download with bounded retry

use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::DownloadConfig;
use crate::version::error::DownloadError;

/// Retry settings for a single download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub attempts: u32,
    /// Timeout applied to each attempt
    pub timeout: Duration,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for RetryPolicy {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            attempts: config.retries,
            timeout: Duration::from_millis(config.timeout_ms),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Trait for fetching a remote file in one attempt
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, DownloadError>;
}

/// Downloader backed by reqwest
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self {
            client: crate::version::registries::http_client(),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, DownloadError> {
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Download `url` into `dest`, retrying failed attempts
///
/// Every attempt uses `policy.timeout`; attempts are separated by
/// `policy.delay`. After `policy.attempts` failures the last error is
/// reported as [`DownloadError::RetriesExhausted`].
pub async fn download_with_retry(
    downloader: &dyn Downloader,
    url: &str,
    policy: &RetryPolicy,
    dest: &Path,
) -> Result<PathBuf, DownloadError> {
    let mut last_error = String::from("no attempts made");

    for attempt in 1..=policy.attempts {
        match downloader.download(url, policy.timeout).await {
            Ok(bytes) => {
                if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                std::fs::write(dest, &bytes).map_err(|source| DownloadError::Io {
                    path: dest.to_path_buf(),
                    source,
                })?;
                info!(
                    "Downloaded {} ({} bytes) to {:?} on attempt {}",
                    url,
                    bytes.len(),
                    dest,
                    attempt
                );
                return Ok(dest.to_path_buf());
            }
            Err(e) => {
                warn!(
                    "Download attempt {}/{} for {} failed: {}",
                    attempt, policy.attempts, url, e
                );
                last_error = e.to_string();
                if attempt < policy.attempts {
                    sleep(policy.delay).await;
                }
            }
        }
    }

    Err(DownloadError::RetriesExhausted {
        url: url.to_string(),
        attempts: policy.attempts,
        last_error,
    })
}
