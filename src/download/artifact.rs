//! Downloaded artifacts: size gate, cleanup and the periodic sweeper.
//!
//! An artifact lives from fetch completion until delivery finishes or the size
//! gate rejects it. Whatever happens in between, the file is deleted; the
//! sweeper catches anything a crash left behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::error::PipelineError;
use crate::core::metrics;
use crate::core::types::MediaKind;
use crate::core::utils::format_bytes;
use crate::storage::session::SessionStore;

/// A fetched media file on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub kind: MediaKind,
}

/// Deletes a file. A missing file is not an error, so calling this twice is fine.
pub async fn cleanup(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            log::debug!("Cleaned up file: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// `cleanup` that logs instead of failing; for exit paths that must not error.
pub async fn cleanup_logged(path: &Path) {
    if let Err(e) = cleanup(path).await {
        log::error!("Failed to clean up {}: {}", path.display(), e);
    }
}

/// Checks the on-disk size against `limit`.
///
/// Oversized artifacts are deleted before the error is returned; an admitted
/// artifact is owned by the caller, who must `cleanup` it after delivery.
pub async fn admit(artifact: DownloadedArtifact, limit: u64) -> Result<DownloadedArtifact, PipelineError> {
    let actual = match tokio::fs::metadata(&artifact.path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            cleanup_logged(&artifact.path).await;
            return Err(PipelineError::TransferFailed(format!(
                "artifact {} unreadable: {}",
                artifact.path.display(),
                e
            )));
        }
    };

    if actual > limit {
        metrics::SIZE_GATE_REJECTIONS_TOTAL.inc();
        log::warn!(
            "Rejecting {}: {} exceeds limit {}",
            artifact.path.display(),
            format_bytes(Some(actual)),
            format_bytes(Some(limit))
        );
        cleanup_logged(&artifact.path).await;
        return Err(PipelineError::SizeLimitExceeded { actual, limit });
    }

    Ok(DownloadedArtifact {
        size_bytes: actual,
        ..artifact
    })
}

/// Deletes regular files in `dir` last modified more than `max_age` ago.
///
/// Returns how many files were removed. A missing directory counts as empty.
pub async fn sweep_once(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match cleanup(&entry.path()).await {
            Ok(()) => {
                removed += 1;
                log::info!("Swept stale artifact {} (age {}s)", entry.path().display(), age.as_secs());
            }
            Err(e) => log::warn!("Failed to sweep {}: {}", entry.path().display(), e),
        }
    }

    metrics::ARTIFACTS_SWEPT_TOTAL.inc_by(removed as u64);
    Ok(removed)
}

/// Starts the background sweeper: stale artifacts and expired sessions, every `interval`.
pub fn spawn_sweeper(
    dir: PathBuf,
    sessions: Arc<SessionStore>,
    interval: Duration,
    max_age: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!(
            "🧹 Artifact sweeper started (interval: {}s, max age: {}s, dir: {})",
            interval.as_secs(),
            max_age.as_secs(),
            dir.display()
        );

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("Artifact sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = sweep_once(&dir, max_age).await {
                        log::error!("Artifact sweep failed: {}", e);
                    }
                    sessions.prune_expired();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn artifact_of_size(dir: &Path, name: &str, size: usize) -> DownloadedArtifact {
        let path = dir.join(name);
        tokio::fs::write(&path, vec![0u8; size]).await.unwrap();
        DownloadedArtifact {
            path,
            size_bytes: 0,
            kind: MediaKind::Video,
        }
    }

    #[tokio::test]
    async fn test_admit_within_limit_reports_disk_size() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_of_size(dir.path(), "ok.mp4", 1024).await;

        let admitted = admit(artifact, 2048).await.unwrap();
        assert_eq!(admitted.size_bytes, 1024);
        assert!(admitted.path.exists());
    }

    #[tokio::test]
    async fn test_admit_over_limit_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_of_size(dir.path(), "big.mp4", 4096).await;
        let path = artifact.path.clone();

        let err = admit(artifact, 1000).await.unwrap_err();
        assert!(matches!(err, PipelineError::SizeLimitExceeded { actual: 4096, limit: 1000 }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_admit_at_exact_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_of_size(dir.path(), "edge.mp4", 1000).await;
        assert!(admit(artifact, 1000).await.is_ok());
    }

    #[tokio::test]
    async fn test_admit_missing_file_is_transfer_failure() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = DownloadedArtifact {
            path: dir.path().join("gone.mp4"),
            size_bytes: 10,
            kind: MediaKind::Video,
        };
        assert!(matches!(admit(artifact, 1000).await, Err(PipelineError::TransferFailed(_))));
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.mp4");
        tokio::fs::write(&path, b"x").await.unwrap();

        cleanup(&path).await.unwrap();
        cleanup(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweep_once_respects_max_age() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("fresh.mp4"), b"x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("nested")).await.unwrap();

        assert_eq!(sweep_once(dir.path(), Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(sweep_once(dir.path(), Duration::ZERO).await.unwrap(), 1);
        assert!(dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(sweep_once(&missing, Duration::ZERO).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(
            dir.path().to_path_buf(),
            Arc::new(SessionStore::new(Duration::from_secs(60))),
            Duration::from_millis(10),
            Duration::from_secs(3600),
            cancel.clone(),
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
