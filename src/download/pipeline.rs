//! Resolution and retrieval pipeline.
//!
//! Two entry points, one per user action:
//! - `submit_url()`: validate → classify → reserve session → provider chain →
//!   format catalog → store session → present options
//! - `submit_selection()`: resolve token → resolve source → fetch → size gate →
//!   deliver → cleanup
//!
//! Each call reports its failure to the front end exactly once. The artifact
//! produced by a selection is removed on every exit path.

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use crate::core::config;
use crate::core::error::{ErrorKind, PipelineError};
use crate::core::metrics;
use crate::core::platform::{classify, Platform};
use crate::core::types::{FormatOption, MediaKind, MediaRequest, SelectionToken, UserId};
use crate::download::artifact::{self, cleanup_logged};
use crate::download::error::DeliveryError;
use crate::download::fetch::Fetcher;
use crate::download::formats;
use crate::download::source::ProviderChain;
use crate::storage::session::{SessionError, SessionStore, SessionTicket};

/// The user-facing side of the pipeline (a chat bot, or a mock in tests).
#[async_trait]
pub trait FrontEnd: Send + Sync {
    /// Shows the quality options; the tokens come back through `submit_selection`.
    async fn present_options(
        &self,
        user_id: UserId,
        platform: Platform,
        options: &[(SelectionToken, FormatOption)],
    ) -> Result<(), DeliveryError>;

    /// Sends the file. The pipeline deletes it once this returns.
    async fn deliver_artifact(
        &self,
        user_id: UserId,
        path: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), DeliveryError>;

    /// Tells the user a request failed. `message` is already user-safe.
    async fn report_error(&self, user_id: UserId, kind: ErrorKind, message: &str);
}

/// Request-level limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Delivery ceiling in bytes
    pub max_file_size: u64,
    pub max_url_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size: config::validation::DEFAULT_MAX_FILE_SIZE_BYTES,
            max_url_length: config::validation::MAX_URL_LENGTH,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            max_file_size: *config::validation::MAX_FILE_SIZE_BYTES,
            max_url_length: config::validation::MAX_URL_LENGTH,
        }
    }
}

/// Caption attached to delivered files
pub fn delivery_caption(kind: MediaKind, platform: Platform) -> String {
    format!("{} Downloaded from {}", kind.emoji(), platform.display_name())
}

pub struct Pipeline {
    chain: ProviderChain,
    sessions: Arc<SessionStore>,
    fetcher: Fetcher,
    front: Arc<dyn FrontEnd>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        chain: ProviderChain,
        sessions: Arc<SessionStore>,
        fetcher: Fetcher,
        front: Arc<dyn FrontEnd>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            chain,
            sessions,
            fetcher,
            front,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Drops the user's pending options, if any.
    pub fn reset_session(&self, user_id: UserId) {
        self.sessions.invalidate(user_id);
    }

    /// Checks scheme and length. Never touches the session store.
    pub fn validate_url(&self, text: &str) -> Result<Url, PipelineError> {
        let text = text.trim();
        if text.len() > self.config.max_url_length {
            return Err(PipelineError::UnsupportedUrl(format!(
                "URL longer than {} characters",
                self.config.max_url_length
            )));
        }
        let url = Url::parse(text).map_err(|e| PipelineError::UnsupportedUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::UnsupportedUrl(format!("scheme '{}'", url.scheme())));
        }
        Ok(url)
    }

    /// Resolves a submitted link and presents its quality options.
    ///
    /// A newer submission from the same user wins: if one arrives while this
    /// call is resolving, this call's options or failure are dropped without a report.
    pub async fn submit_url(&self, user_id: UserId, text: &str) -> Result<(), PipelineError> {
        let url = match self.validate_url(text) {
            Ok(url) => url,
            Err(e) => return self.report_failure(user_id, Err(e)).await,
        };
        let ticket = self.sessions.begin(user_id);

        let result = self.resolve_and_present(ticket, url).await;
        if result.is_err() && !self.sessions.is_current(ticket) {
            log::info!("Not reporting failure of superseded request from user {}", user_id);
            return result;
        }
        self.report_failure(user_id, result).await
    }

    async fn resolve_and_present(&self, ticket: SessionTicket, url: Url) -> Result<(), PipelineError> {
        let user_id = ticket.user_id;
        let platform = classify(url.as_str());

        log::info!("User {} submitted {} link: {}", user_id, platform, url);

        let resolution = self.chain.resolve(&url, platform).await?;
        let options = formats::normalize(&resolution.formats);

        let request = MediaRequest {
            source_url: url,
            platform,
            user_id,
            created_at: Utc::now(),
            provider: resolution.provider,
        };

        let tokens = match self.sessions.put(ticket, request, options) {
            Ok(tokens) => tokens,
            Err(SessionError::Superseded) => {
                log::info!("Dropping superseded resolution for user {}", user_id);
                return Ok(());
            }
        };

        if let Err(e) = self.front.present_options(user_id, platform, &tokens).await {
            log::warn!("Failed to present options to user {}: {}", user_id, e);
        }
        Ok(())
    }

    /// Retrieves and delivers the option behind `token`.
    pub async fn submit_selection(&self, user_id: UserId, token: &SelectionToken) -> Result<(), PipelineError> {
        let result = self.fetch_and_deliver(user_id, token).await;
        if result.is_ok() {
            metrics::record_request("delivered");
        }
        self.report_failure(user_id, result).await
    }

    async fn fetch_and_deliver(&self, user_id: UserId, token: &SelectionToken) -> Result<(), PipelineError> {
        let (request, option) = self
            .sessions
            .resolve(user_id, token)
            .ok_or(PipelineError::SessionExpired)?;

        log::info!(
            "User {} selected {} ({}) for {} via {}",
            user_id,
            option.quality_label,
            option.id,
            request.source_url,
            request.provider
        );

        let source = self
            .chain
            .resolve_source(&request.provider, &request.source_url, &option)
            .await
            .map_err(|e| PipelineError::TransferFailed(format!("{}: {}", request.provider, e)))?;

        let fetched = self
            .fetcher
            .fetch(source, &option)
            .await
            .map_err(|e| PipelineError::TransferFailed(e.to_string()))?;

        let artifact = artifact::admit(fetched, self.config.max_file_size).await?;

        let caption = delivery_caption(artifact.kind, request.platform);
        let delivered = self
            .front
            .deliver_artifact(user_id, &artifact.path, artifact.kind, &caption)
            .await;
        cleanup_logged(&artifact.path).await;

        delivered.map_err(|e| {
            log::warn!("Delivery to user {} failed: {}", user_id, e);
            PipelineError::DeliveryFailed(e.to_string())
        })?;

        log::info!("User {} downloaded from {}", user_id, request.platform);
        Ok(())
    }

    async fn report_failure(&self, user_id: UserId, result: Result<(), PipelineError>) -> Result<(), PipelineError> {
        if let Err(e) = &result {
            let kind = e.kind();
            log::warn!("Request from user {} failed ({}): {}", user_id, kind.as_str(), e);
            metrics::record_request(kind.as_str());
            self.front.report_error(user_id, kind, &e.user_message()).await;
        }
        result
    }
}
