//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod metrics_server;
pub mod platform;
pub mod retry;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, ErrorKind, PipelineError};
pub use logging::{init_logger, log_startup_configuration};
pub use platform::{classify, Platform};
