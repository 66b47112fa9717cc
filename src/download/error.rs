use std::time::Duration;
use thiserror::Error;

use crate::core::retry::Retryable;
use crate::download::source::AttemptOutcome;

/// Failure of a single provider call.
///
/// Never leaves the provider chain: the chain logs it, counts it and moves on.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider does not handle this URL or does not implement the operation
    #[error("unsupported by provider")]
    Unsupported,
    /// Call exceeded the per-call timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Backend answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend answered, but not with something we understand
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Backend understood the request and refused it
    #[error("rejected: {0}")]
    Rejected(String),
    /// External process (yt-dlp) failed
    #[error("process error: {0}")]
    Process(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// How the chain records this failure
    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            ProviderError::Unsupported => AttemptOutcome::Unsupported,
            _ => AttemptOutcome::Failed,
        }
    }
}

/// Failure while moving bytes to local storage.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server error, rate limit or dropped connection; worth another attempt
    #[error("transient: {0}")]
    Transient(String),
    /// 4xx, wrong content type, bad URL; retrying cannot help
    #[error("permanent: {0}")]
    Permanent(String),
    /// No chunk arrived within the read timeout
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),
    /// Local disk failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Library-managed download failed inside the provider
    #[error("provider download failed: {0}")]
    Provider(#[from] ProviderError),
    /// Audio extraction failed
    #[error("post-processing failed: {0}")]
    PostProcess(String),
}

impl FetchError {
    /// Classifies a reqwest failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_retryable() {
            FetchError::Transient(err.to_string())
        } else {
            FetchError::Permanent(err.to_string())
        }
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FetchError::Transient(format!("HTTP {}", status))
        } else {
            FetchError::Permanent(format!("HTTP {}", status))
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transient(_) | FetchError::ReadTimeout(_) => true,
            FetchError::Io(e) => e.is_retryable(),
            FetchError::Permanent(_) | FetchError::Provider(_) | FetchError::PostProcess(_) => false,
        }
    }
}

/// Failure reported by the delivery channel.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Transport refused the payload size (distinct from the size gate pre-check)
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    /// Network failure talking to the transport
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    Other(String),
}
