//! Dorafetch - Telegram bot that turns media links into files
//!
//! A link goes through a fallback chain of extraction providers, the formats
//! they report become a short list of quality options, and the chosen one is
//! fetched, size-checked against the Bot API ceiling, delivered and deleted.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, metrics and shared types
//! - `download`: Provider chain, format catalog, fetcher and the pipeline
//! - `storage`: Per-user selection sessions
//! - `telegram`: Bot setup, dispatcher schema and the Telegram front end

pub mod cli;
pub mod core;
pub mod download;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use self::core::{config, AppError, PipelineError};
pub use download::{Pipeline, PipelineConfig};
pub use storage::SessionStore;
