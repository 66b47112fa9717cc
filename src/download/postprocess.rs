//! Audio post-processing: ffmpeg extraction to mp3 for audio-only selections.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::core::utils::truncate_chars;
use crate::download::artifact::cleanup;
use crate::download::error::FetchError;
use crate::download::formats::AUDIO_CONTAINER;
use crate::download::pool::BlockingPool;
use crate::download::process::{wait_with_deadline, ProcessError};

/// Target bitrate of extracted audio
pub const AUDIO_BITRATE: &str = "192k";

fn is_mp3(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(AUDIO_CONTAINER))
}

fn ffmpeg_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-acodec".to_string(),
        "libmp3lame".to_string(),
        "-b:a".to_string(),
        AUDIO_BITRATE.to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Extracts the audio track of `input` into an mp3 next to it.
///
/// On success the input is removed and the mp3 path returned. On failure both
/// files are removed. Inputs that already are mp3 pass through untouched.
/// An ffmpeg run longer than `timeout` is killed and counts as a failure.
pub async fn extract_audio(
    pool: &BlockingPool,
    ffmpeg_bin: &str,
    input: PathBuf,
    timeout: Duration,
) -> Result<PathBuf, FetchError> {
    if is_mp3(&input) {
        return Ok(input);
    }

    let output = input.with_extension(AUDIO_CONTAINER);
    let args = ffmpeg_args(&input, &output);
    let bin = ffmpeg_bin.to_string();

    log::info!("Extracting audio: {} -> {}", input.display(), output.display());

    let result = pool
        .run(move || {
            let child = Command::new(&bin)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| format!("failed to run {}: {}", bin, e))?;
            wait_with_deadline(child, timeout).map_err(|e| match e {
                ProcessError::TimedOut(limit) => format!("ffmpeg killed after {}s", limit.as_secs()),
                ProcessError::Io(e) => format!("failed to wait for ffmpeg: {}", e),
            })
        })
        .await;

    let failure = match result {
        Ok(Ok(out)) if out.success => None,
        Ok(Ok(out)) => Some(format!(
            "ffmpeg failed: {}",
            truncate_chars(out.last_error_line().trim(), 300)
        )),
        Ok(Err(e)) => Some(e),
        Err(e) => Some(e.to_string()),
    };

    if let Some(message) = failure {
        for path in [&input, &output] {
            if let Err(e) = cleanup(path).await {
                log::warn!("Failed to remove {} after ffmpeg failure: {}", path.display(), e);
            }
        }
        return Err(FetchError::PostProcess(message));
    }

    if let Err(e) = cleanup(&input).await {
        log::warn!("Failed to remove intermediate file {}: {}", input.display(), e);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mp3_input_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.MP3");
        std::fs::write(&input, b"id3").unwrap();

        let pool = BlockingPool::new(1);
        let out = extract_audio(&pool, "/nonexistent/ffmpeg", input.clone(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, input);
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_failure_removes_intermediate_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.m4a");
        std::fs::write(&input, b"not really audio").unwrap();

        let pool = BlockingPool::new(1);
        let err = extract_audio(&pool, "/nonexistent/ffmpeg", input.clone(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::PostProcess(_)));
        assert!(!input.exists());
        assert!(!dir.path().join("a.mp3").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_converter_is_killed_and_cleaned_up() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-ffmpeg");
        std::fs::write(&fake, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = dir.path().join("b.m4a");
        std::fs::write(&input, b"audio").unwrap();

        let pool = BlockingPool::new(1);
        let started = std::time::Instant::now();
        let err = extract_audio(&pool, fake.to_str().unwrap(), input.clone(), Duration::from_millis(300))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(&err, FetchError::PostProcess(msg) if msg.contains("killed")), "{:?}", err);
        assert!(!input.exists());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = ffmpeg_args(Path::new("/d/x.m4a"), Path::new("/d/x.mp3"));
        assert_eq!(args.last().map(String::as_str), Some("/d/x.mp3"));
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "192k"));
        assert!(args.contains(&"-vn".to_string()));
    }
}
