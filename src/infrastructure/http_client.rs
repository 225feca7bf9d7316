/// HTTP download adapter
/// Implements InstallerDownloader by streaming a reqwest response to disk

use crate::domain::repositories::{DownloadError, InstallerDownloader};
use crate::domain::utils::ProgressTracker;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("acuhelper/", env!("CARGO_PKG_VERSION"));

/// Implementation using reqwest; no timeout and no resume
#[derive(Clone, Default)]
pub struct ReqwestDownloader {
    client: reqwest::Client,
}

impl ReqwestDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InstallerDownloader for ReqwestDownloader {
    async fn download(
        &self,
        url: &str,
        destination: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<u64, DownloadError> {
        let request_error = |message: String| DownloadError::Request {
            url: url.to_string(),
            message,
        };
        let io_error = |e: std::io::Error| DownloadError::Io {
            path: destination.to_path_buf(),
            message: e.to_string(),
        };

        tracing::debug!("Sending HTTP request to: {}", url);

        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| request_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let mut file = tokio::fs::File::create(destination).await.map_err(io_error)?;
        let mut tracker = ProgressTracker::new(response.content_length());

        progress(0);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| request_error(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(io_error)?;
            if let Some(percent) = tracker.advance(chunk.len() as u64) {
                progress(percent);
            }
        }
        file.flush().await.map_err(io_error)?;

        tracing::debug!("Downloaded {} bytes to {}", tracker.received(), destination.display());
        Ok(tracker.received())
    }
}
