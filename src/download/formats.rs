//! Format catalog: turns a provider's raw format listing into the ranked,
//! deduplicated list of options shown to the user.
//!
//! Guarantees for every returned list:
//! - never empty
//! - at most one entry per (height, frame rate)
//! - sorted by (height, frame rate) descending, audio-only last

use std::collections::HashSet;

use crate::core::types::{FormatOption, MediaKind, RawFormat};

/// Formats above this size are never offered; nothing that large can be delivered.
pub const MAX_FORMAT_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Format id of the synthetic audio-only option
pub const AUDIO_FORMAT_ID: &str = "bestaudio";

/// Format id of the synthetic fallback option
pub const BEST_FORMAT_ID: &str = "best";

/// Container every audio selection ends up in after post-processing
pub const AUDIO_CONTAINER: &str = "mp3";

/// Human-readable label for a vertical resolution.
pub fn quality_label(height: u32) -> String {
    match height {
        h if h >= 2160 => "4K (2160p)".to_string(),
        h if h >= 1440 => "2K (1440p)".to_string(),
        h if h >= 1080 => "1080p (Full HD)".to_string(),
        h if h >= 720 => "720p (HD)".to_string(),
        h if h >= 480 => "480p (SD)".to_string(),
        h if h >= 360 => "360p".to_string(),
        h => format!("{}p", h),
    }
}

fn video_label(height: u32, frame_rate: Option<u32>) -> String {
    match frame_rate {
        Some(fps) if fps > 30 => format!("{} {}fps", quality_label(height), fps),
        _ => quality_label(height),
    }
}

/// The audio-only option appended when a provider did not list one.
pub fn synthetic_audio_option() -> FormatOption {
    FormatOption {
        id: AUDIO_FORMAT_ID.to_string(),
        quality_label: "Audio Only".to_string(),
        height_class: 0,
        frame_rate: None,
        estimated_size_bytes: None,
        container_ext: AUDIO_CONTAINER.to_string(),
        kind: MediaKind::Audio,
    }
}

/// The fallback entry used when a provider listed no usable video formats.
pub fn best_available_option() -> FormatOption {
    FormatOption {
        id: BEST_FORMAT_ID.to_string(),
        quality_label: "Best available".to_string(),
        height_class: 0,
        frame_rate: None,
        estimated_size_bytes: None,
        container_ext: "mp4".to_string(),
        kind: MediaKind::Video,
    }
}

fn audio_option_from(raw: &RawFormat) -> FormatOption {
    FormatOption {
        id: raw.format_id.clone(),
        estimated_size_bytes: raw.filesize,
        ..synthetic_audio_option()
    }
}

/// Normalizes raw provider formats into the option list shown to the user.
///
/// - Video entries without a height are skipped
/// - Duplicates by (height, frame rate) keep the first-seen entry
/// - Only the first provider-supplied audio entry is kept; a synthetic one is
///   appended when none was supplied
/// - Entries with a known size above `MAX_FORMAT_SIZE_BYTES` are dropped
pub fn normalize(raw: &[RawFormat]) -> Vec<FormatOption> {
    let mut seen: HashSet<(u32, Option<u32>)> = HashSet::new();
    let mut videos: Vec<FormatOption> = Vec::new();
    let mut audio: Option<FormatOption> = None;

    for format in raw {
        if format.filesize.is_some_and(|size| size > MAX_FORMAT_SIZE_BYTES) {
            log::debug!("Skipping format {}: too large ({:?} bytes)", format.format_id, format.filesize);
            continue;
        }

        match format.kind {
            MediaKind::Audio => {
                if audio.is_none() {
                    audio = Some(audio_option_from(format));
                }
            }
            MediaKind::Video => {
                let Some(height) = format.height.filter(|h| *h > 0) else {
                    continue;
                };
                let frame_rate = format.fps.map(|fps| fps.round() as u32).filter(|fps| *fps > 0);

                if !seen.insert((height, frame_rate)) {
                    continue;
                }

                videos.push(FormatOption {
                    id: format.format_id.clone(),
                    quality_label: video_label(height, frame_rate),
                    height_class: height,
                    frame_rate,
                    estimated_size_bytes: format.filesize,
                    container_ext: format.ext.clone().unwrap_or_else(|| "mp4".to_string()),
                    kind: MediaKind::Video,
                });
            }
        }
    }

    if videos.is_empty() {
        videos.push(best_available_option());
    }

    // Stable sort keeps first-seen order for equal keys
    videos.sort_by(|a, b| (b.height_class, b.frame_rate).cmp(&(a.height_class, a.frame_rate)));

    videos.push(audio.unwrap_or_else(synthetic_audio_option));
    videos
}
