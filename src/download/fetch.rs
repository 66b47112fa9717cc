//! Media fetcher: moves the bytes of a resolved source onto local disk.
//!
//! HTTP sources are streamed chunk by chunk into a uniquely named file with a
//! per-chunk read timeout, retried on transient failures. Library-managed
//! sources are handed to their provider. Audio selections then go through the
//! ffmpeg post-step. Every failure path removes whatever was written.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::core::config;
use crate::core::metrics;
use crate::core::retry::{retry, RetryConfig};
use crate::core::types::{FormatOption, MediaKind};
use crate::download::artifact::{cleanup_logged, DownloadedArtifact};
use crate::download::error::FetchError;
use crate::download::pool::BlockingPool;
use crate::download::postprocess;
use crate::download::source::{DirectLink, DirectSource};

/// HTTP client for media transfers: connect timeout only, no overall deadline
pub fn transfer_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("dorafetch/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(config::fetch::connect_timeout())
        .build()
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
    pool: BlockingPool,
    read_timeout: Duration,
    retry: RetryConfig,
    ffmpeg_bin: String,
    ffmpeg_timeout: Duration,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, download_dir: impl Into<PathBuf>, pool: BlockingPool) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
            pool,
            read_timeout: config::fetch::read_timeout(),
            retry: RetryConfig::transfer(),
            ffmpeg_bin: config::FFMPEG_BIN.clone(),
            ffmpeg_timeout: config::provider::ffmpeg_timeout(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    #[must_use]
    pub fn with_ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = bin.into();
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Retrieves `source` into the download directory.
    ///
    /// The returned artifact is owned by the caller. On error nothing is left on disk.
    pub async fn fetch(&self, source: DirectSource, format: &FormatOption) -> Result<DownloadedArtifact, FetchError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let path = match source {
            DirectSource::Url(link) => self.fetch_link(&link).await?,
            DirectSource::Managed { provider, url, format } => {
                log::info!("Handing {} to provider {} (format {})", url, provider.name(), format.id);
                provider.download(&url, &format, &self.download_dir).await?
            }
        };

        let path = match format.kind {
            MediaKind::Audio => {
                postprocess::extract_audio(&self.pool, &self.ffmpeg_bin, path, self.ffmpeg_timeout).await?
            },
            MediaKind::Video => path,
        };

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                cleanup_logged(&path).await;
                return Err(FetchError::Io(e));
            }
        };

        metrics::FETCHED_BYTES_TOTAL
            .with_label_values(&[format.kind.as_str()])
            .inc_by(size_bytes as f64);

        Ok(DownloadedArtifact {
            path,
            size_bytes,
            kind: format.kind,
        })
    }

    async fn fetch_link(&self, link: &DirectLink) -> Result<PathBuf, FetchError> {
        let path = self
            .download_dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), link.ext));

        let outcome = retry(&self.retry, || self.stream_to_file(&link.url, &path)).await;
        let attempts = outcome.attempts;
        let elapsed = outcome.total_duration;

        match outcome.into_result() {
            Ok(written) => {
                log::info!(
                    "Fetched {} bytes from {} in {} attempt(s), {:.1}s -> {}",
                    written,
                    link.url.host_str().unwrap_or("?"),
                    attempts,
                    elapsed.as_secs_f64(),
                    path.display()
                );
                Ok(path)
            }
            Err(e) => {
                log::warn!("Fetch of {} failed after {} attempt(s): {}", link.url, attempts, e);
                cleanup_logged(&path).await;
                Err(e)
            }
        }
    }

    /// One transfer attempt. Truncates `path` first, so a retry never appends to a partial file.
    async fn stream_to_file(&self, url: &Url, path: &Path) -> Result<u64, FetchError> {
        let response = tokio::time::timeout(self.read_timeout, self.client.get(url.as_str()).send())
            .await
            .map_err(|_| FetchError::ReadTimeout(self.read_timeout))?
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if content_type.starts_with("text/html") {
            return Err(FetchError::Permanent(format!("expected media, got {}", content_type)));
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let chunk = match tokio::time::timeout(self.read_timeout, stream.next()).await {
                Err(_) => return Err(FetchError::ReadTimeout(self.read_timeout)),
                Ok(None) => break,
                Ok(Some(chunk)) => chunk.map_err(FetchError::from_reqwest)?,
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }
}
