//! Resolution, retrieval and post-processing of media

pub mod artifact;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod pipeline;
pub mod pool;
pub mod postprocess;
pub mod process;
pub mod source;

// Re-exports for convenience
pub use artifact::DownloadedArtifact;
pub use fetch::Fetcher;
pub use pipeline::{FrontEnd, Pipeline, PipelineConfig};
pub use pool::BlockingPool;
pub use source::{build_chain, MediaProvider, ProviderChain};
