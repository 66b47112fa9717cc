//! Bounded pool for blocking work (yt-dlp and ffmpeg processes).
//!
//! Callers wait for a permit before their closure is handed to
//! `spawn_blocking`, so at most `size` external processes run at once and
//! excess work queues up instead of piling onto the runtime.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::core::config;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("blocking pool is closed")]
    Closed,
    #[error("blocking task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(*config::pool::SIZE)
    }
}

impl BlockingPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `task` on the blocking thread pool once a permit is free.
    pub async fn run<F, T>(&self, task: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await
        .map_err(|e| PoolError::Panicked(e.to_string()))
    }
}
