//! YtDlpProvider: extraction through the yt-dlp binary.
//!
//! Probing runs `yt-dlp --dump-json` and maps its format list; downloads are
//! left to yt-dlp itself (merging video with the best audio track). Both run as
//! blocking child processes on the `BlockingPool` and are killed when they
//! overrun their deadline.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use url::Url;

use crate::core::config;
use crate::core::types::{FormatOption, MediaKind, RawFormat};
use crate::core::utils::truncate_chars;
use crate::download::error::ProviderError;
use crate::download::formats::{AUDIO_FORMAT_ID, BEST_FORMAT_ID};
use crate::download::pool::BlockingPool;
use crate::download::process::{wait_with_deadline, ProcessError, ProcessOutput};
use crate::download::source::MediaProvider;

pub const NAME: &str = "ytdlp";

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    height: Option<u32>,
    fps: Option<f64>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

impl YtDlpFormat {
    fn into_raw(self) -> Option<RawFormat> {
        // yt-dlp leaves codec fields out for plain HTTP files; only "none" is authoritative
        let no_video = self.vcodec.as_deref() == Some("none");
        let no_audio = self.acodec.as_deref() == Some("none");

        let kind = match (no_video, no_audio) {
            // storyboards and other image tracks
            (true, true) => return None,
            (true, false) => MediaKind::Audio,
            (false, _) => MediaKind::Video,
        };

        Some(RawFormat {
            format_id: self.format_id,
            height: self.height,
            fps: self.fps,
            filesize: self.filesize.or(self.filesize_approx),
            ext: self.ext,
            kind,
        })
    }
}

/// Maps `--dump-json` output to raw formats.
pub fn parse_formats(json: &str) -> Result<Vec<RawFormat>, ProviderError> {
    let info: YtDlpInfo = serde_json::from_str(json).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    Ok(info.formats.into_iter().filter_map(YtDlpFormat::into_raw).collect())
}

/// yt-dlp `--format` selector for a chosen option
pub fn format_selector(format: &FormatOption) -> String {
    match (format.kind, format.id.as_str()) {
        (MediaKind::Audio, AUDIO_FORMAT_ID) => "bestaudio/best".to_string(),
        (MediaKind::Audio, id) => format!("{}/bestaudio/best", id),
        (MediaKind::Video, BEST_FORMAT_ID) => "bestvideo+bestaudio/best".to_string(),
        (MediaKind::Video, id) => format!("{}+bestaudio/{}", id, id),
    }
}

fn run_ytdlp(bin: &str, args: &[String], timeout: Duration) -> Result<ProcessOutput, ProviderError> {
    log::debug!("Running {} {}", bin, args.join(" "));
    let child = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ProviderError::Process(format!("failed to spawn {}: {}", bin, e)))?;

    let output = wait_with_deadline(child, timeout).map_err(|e| match e {
        ProcessError::TimedOut(limit) => {
            log::error!("yt-dlp process timed out after {}s, killed", limit.as_secs());
            ProviderError::Timeout(limit)
        }
        ProcessError::Io(e) => ProviderError::Io(e),
    })?;
    if output.success {
        Ok(output)
    } else {
        Err(ProviderError::Process(truncate_chars(output.last_error_line(), 300).to_string()))
    }
}

/// Locates the file yt-dlp wrote for `stem`, ignoring leftovers like `.part`.
fn find_output(dir: &Path, stem: &str) -> Option<PathBuf> {
    let prefix = format!("{}.", stem);
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl"))
        })
}

/// Extraction provider backed by the yt-dlp binary.
pub struct YtDlpProvider {
    pool: BlockingPool,
    bin: String,
    probe_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlpProvider {
    pub fn new(pool: BlockingPool) -> Self {
        Self {
            pool,
            bin: config::YTDL_BIN.clone(),
            probe_timeout: config::provider::call_timeout(),
            download_timeout: config::provider::ytdlp_download_timeout(),
        }
    }

    #[must_use]
    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn probe(&self, url: &Url) -> Result<Vec<RawFormat>, ProviderError> {
        let bin = self.bin.clone();
        let timeout = self.probe_timeout;
        let args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "20".to_string(),
            url.to_string(),
        ];

        let output = self
            .pool
            .run(move || run_ytdlp(&bin, &args, timeout))
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))??;

        parse_formats(&output.stdout)
    }

    fn manages_download(&self) -> bool {
        true
    }

    async fn download(&self, url: &Url, format: &FormatOption, dest_dir: &Path) -> Result<PathBuf, ProviderError> {
        let stem = uuid::Uuid::new_v4().to_string();
        let template = dest_dir.join(format!("{}.%(ext)s", stem));

        let mut args = vec![
            "--format".to_string(),
            format_selector(format),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            "--no-progress".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--retries".to_string(),
            "3".to_string(),
        ];
        if format.kind == MediaKind::Video {
            args.extend(["--merge-output-format".to_string(), "mp4".to_string()]);
        }
        args.push(url.to_string());

        log::info!("yt-dlp download {} format {} -> {}", url, format.id, stem);

        let bin = self.bin.clone();
        let timeout = self.download_timeout;
        let result = self
            .pool
            .run(move || run_ytdlp(&bin, &args, timeout))
            .await
            .map_err(|e| ProviderError::Process(e.to_string()));

        match result {
            Ok(Ok(_)) => find_output(dest_dir, &stem)
                .ok_or_else(|| ProviderError::Process("yt-dlp finished but produced no file".to_string())),
            Ok(Err(e)) | Err(e) => {
                // remove partial fragments left under our stem
                while let Some(leftover) = find_partial(dest_dir, &stem) {
                    if std::fs::remove_file(&leftover).is_err() {
                        break;
                    }
                }
                Err(e)
            }
        }
    }
}

fn find_partial(dir: &Path, stem: &str) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(stem))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::formats::{normalize, synthetic_audio_option};
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "id": "abc",
        "title": "Sample",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "filesize": 3400000},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a", "height": 360, "fps": 30},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1", "acodec": "none", "height": 1080, "fps": 30, "filesize_approx": 90000000},
            {"format_id": "299", "ext": "mp4", "vcodec": "avc1", "acodec": "none", "height": 1080, "fps": 60}
        ]
    }"#;

    #[test]
    fn test_parse_formats_maps_kinds_and_sizes() {
        let raw = parse_formats(SAMPLE).unwrap();
        let ids: Vec<&str> = raw.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["140", "18", "137", "299"]);
        assert_eq!(raw[0].kind, MediaKind::Audio);
        assert_eq!(raw[2].filesize, Some(90_000_000));

        let options = normalize(&raw);
        let ids: Vec<&str> = options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["299", "137", "18", "140"]);
    }

    #[test]
    fn test_parse_formats_keeps_entries_without_codec_fields() {
        let json = r#"{"formats": [
            {"format_id": "http-480", "height": 480, "ext": "mp4"},
            {"format_id": "http-720", "height": 720, "ext": "mp4"},
            {"format_id": "audio-only", "ext": "m4a", "vcodec": "none"}
        ]}"#;
        let raw = parse_formats(json).unwrap();
        let kinds: Vec<(&str, MediaKind)> = raw.iter().map(|f| (f.format_id.as_str(), f.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("http-480", MediaKind::Video),
                ("http-720", MediaKind::Video),
                ("audio-only", MediaKind::Audio)
            ]
        );

        let ids: Vec<String> = normalize(&raw).into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["http-720", "http-480", "audio-only"]);
    }

    #[test]
    fn test_parse_formats_rejects_garbage() {
        assert!(matches!(parse_formats("ERROR: nope"), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_parse_formats_without_format_list() {
        assert_eq!(parse_formats(r#"{"id": "x"}"#).unwrap(), Vec::<RawFormat>::new());
    }

    #[test]
    fn test_format_selector() {
        let mut video = normalize(&[RawFormat::video("137", 1080)]).remove(0);
        assert_eq!(format_selector(&video), "137+bestaudio/137");

        video.id = BEST_FORMAT_ID.to_string();
        assert_eq!(format_selector(&video), "bestvideo+bestaudio/best");

        assert_eq!(format_selector(&synthetic_audio_option()), "bestaudio/best");
    }

    #[test]
    fn test_find_output_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.mp4.part"), b"x").unwrap();
        assert_eq!(find_output(dir.path(), "abc"), None);

        std::fs::write(dir.path().join("abc.mp4"), b"x").unwrap();
        assert_eq!(find_output(dir.path(), "abc"), Some(dir.path().join("abc.mp4")));
    }

    #[tokio::test]
    async fn test_missing_binary_is_process_error() {
        let provider = YtDlpProvider::new(BlockingPool::new(1)).with_bin("/nonexistent/yt-dlp");
        let url = Url::parse("https://www.youtube.com/watch?v=abc").unwrap();
        let err = provider.probe(&url).await.unwrap_err();
        assert!(matches!(err, ProviderError::Process(_)));
    }
}
