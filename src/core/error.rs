use thiserror::Error;

use crate::core::utils::format_bytes;

/// Startup and wiring errors for the bot binary
///
/// Request-level failures never end up here; those are `PipelineError`s and are
/// reported to the user instead of bubbling up.
///
/// # Example
///
/// ```no_run
/// use dorafetch::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

/// Failures that end a single user request.
///
/// Per-provider failures never appear here individually; the chain folds them
/// into `AllProvidersExhausted`.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Not a link we can attempt at all (bad scheme, too long, empty chain)
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// Every provider declined or failed
    #[error("All {attempted} provider(s) failed to resolve the link")]
    AllProvidersExhausted { attempted: usize },

    /// Token from a superseded, expired or unknown session
    #[error("Selection session expired")]
    SessionExpired,

    /// Artifact larger than the delivery ceiling; the file is already deleted
    #[error("File too large: {} > {}", format_bytes(Some(*actual)), format_bytes(Some(*limit)))]
    SizeLimitExceeded { actual: u64, limit: u64 },

    /// Retrieval failed after retries were exhausted
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// The delivery channel rejected the file
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

/// User-facing error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedUrl,
    AllProvidersExhausted,
    SessionExpired,
    SizeLimitExceeded,
    TransferFailed,
    DeliveryFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedUrl => "unsupported_url",
            ErrorKind::AllProvidersExhausted => "all_providers_exhausted",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::SizeLimitExceeded => "size_limit_exceeded",
            ErrorKind::TransferFailed => "transfer_failed",
            ErrorKind::DeliveryFailed => "delivery_failed",
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedUrl(_) => ErrorKind::UnsupportedUrl,
            PipelineError::AllProvidersExhausted { .. } => ErrorKind::AllProvidersExhausted,
            PipelineError::SessionExpired => ErrorKind::SessionExpired,
            PipelineError::SizeLimitExceeded { .. } => ErrorKind::SizeLimitExceeded,
            PipelineError::TransferFailed(_) => ErrorKind::TransferFailed,
            PipelineError::DeliveryFailed(_) => ErrorKind::DeliveryFailed,
        }
    }

    /// Short actionable message for the user. Never contains raw error text.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::UnsupportedUrl(_) => {
                "❌ Please send a valid URL starting with http:// or https://".to_string()
            }
            PipelineError::AllProvidersExhausted { .. } => "❌ Could not process this link.\n\n\
                 • Check that the URL is correct and accessible\n\
                 • Make sure the video is public\n\
                 • Type /help to see supported platforms"
                .to_string(),
            PipelineError::SessionExpired => "❌ Session expired. Please send the URL again.".to_string(),
            PipelineError::SizeLimitExceeded { actual, limit } => format!(
                "❌ File too large\n\nFile size: {}\nLimit: {}\n\nPlease try a lower quality option.",
                format_bytes(Some(*actual)),
                format_bytes(Some(*limit))
            ),
            PipelineError::TransferFailed(_) => "❌ Download failed. Please try a different quality option \
                 or send the URL again."
                .to_string(),
            PipelineError::DeliveryFailed(_) => "❌ Could not send the file. Please try again later.".to_string(),
        }
    }
}
