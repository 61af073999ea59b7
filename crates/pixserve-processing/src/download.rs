//! Streaming image download
//!
//! Downloads run over a single shared `reqwest::Client`, so sockets are
//! pooled and reused across requests for both plain and encrypted transport.
//! The response body is consumed chunk by chunk and aborted as soon as the
//! accumulated size passes the configured ceiling, bounding memory against
//! adversarial or misconfigured sources.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("response exceeded size ceiling of {limit} bytes")]
    SizeExceeded { limit: u64 },

    #[error("network error: {0}")]
    Network(String),
}

/// Seam between the retry/batch layers and the network. Production code uses
/// [`HttpDownloader`]; tests substitute stub fetchers.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError>;
}

pub struct HttpDownloader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpDownloader {
    /// `pool_size` bounds idle sockets per host and should match the
    /// processing concurrency ceiling.
    pub fn new(
        timeout: Duration,
        max_bytes: u64,
        pool_size: usize,
    ) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool_size)
            .build()?;
        Ok(Self { client, max_bytes })
    }
}

fn map_transport_error(error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::Timeout
    } else {
        DownloadError::Network(error.to_string())
    }
}

#[async_trait]
impl ImageFetcher for HttpDownloader {
    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        // A declared length past the ceiling fails before any body bytes are
        // read; undeclared or lying lengths are caught while streaming.
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(DownloadError::SizeExceeded {
                    limit: self.max_bytes,
                });
            }
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(map_transport_error)? {
            if buffer.len() as u64 + chunk.len() as u64 > self.max_bytes {
                tracing::warn!(
                    url = %url,
                    limit_bytes = self.max_bytes,
                    "Aborting download past size ceiling"
                );
                return Err(DownloadError::SizeExceeded {
                    limit: self.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        tracing::debug!(url = %url, bytes = buffer.len(), "Download complete");
        Ok(buffer.freeze())
    }
}
