use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::core::platform::Platform;

/// Telegram user id of the requester
pub type UserId = u64;

/// What a format or artifact carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            MediaKind::Video => "🎬",
            MediaKind::Audio => "🎵",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One format entry exactly as a provider reported it, before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFormat {
    pub format_id: String,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub filesize: Option<u64>,
    pub ext: Option<String>,
    pub kind: MediaKind,
}

impl RawFormat {
    pub fn video(format_id: impl Into<String>, height: u32) -> Self {
        Self {
            format_id: format_id.into(),
            height: Some(height),
            kind: MediaKind::Video,
            ..Default::default()
        }
    }

    pub fn audio(format_id: impl Into<String>) -> Self {
        Self {
            format_id: format_id.into(),
            kind: MediaKind::Audio,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    #[must_use]
    pub fn with_size(mut self, bytes: u64) -> Self {
        self.filesize = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = Some(ext.into());
        self
    }
}

/// A quality option shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatOption {
    /// Provider-specific format id passed back on resolve
    pub id: String,
    pub quality_label: String,
    /// Vertical resolution; 0 for audio and for the synthetic "best" entry
    pub height_class: u32,
    pub frame_rate: Option<u32>,
    pub estimated_size_bytes: Option<u64>,
    pub container_ext: String,
    pub kind: MediaKind,
}

impl FormatOption {
    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }
}

/// A resolved link awaiting the user's quality choice. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub source_url: Url,
    pub platform: Platform,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Name of the provider that resolved the link
    pub provider: String,
}

/// Opaque handle carried in callback data.
///
/// Encoded as `{generation}:{index}`; the generation is store-wide and monotonic,
/// never derived from the URL. Always well under Telegram's 64-byte callback limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionToken {
    pub generation: u64,
    pub index: u16,
}

impl SelectionToken {
    /// Prefix that marks our callback data
    pub const PREFIX: &'static str = "dl:";

    pub fn new(generation: u64, index: u16) -> Self {
        Self { generation, index }
    }

    /// Encodes the token as callback data
    pub fn to_callback_data(&self) -> String {
        format!("{}{}", Self::PREFIX, self)
    }

    /// Parses callback data produced by `to_callback_data`
    pub fn from_callback_data(data: &str) -> Option<Self> {
        data.strip_prefix(Self::PREFIX)?.parse().ok()
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{}", self.generation, self.index)
    }
}

impl FromStr for SelectionToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (generation, index) = s.split_once(':').ok_or_else(|| format!("Malformed token: {}", s))?;
        let generation = u64::from_str_radix(generation, 16).map_err(|e| format!("Malformed token: {}", e))?;
        let index = index.parse::<u16>().map_err(|e| format!("Malformed token: {}", e))?;
        Ok(Self { generation, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_callback_data_round_trip() {
        let token = SelectionToken::new(u64::MAX, u16::MAX);
        let data = token.to_callback_data();
        assert!(data.len() <= 64, "callback data too long: {}", data.len());
        assert_eq!(SelectionToken::from_callback_data(&data), Some(token));
    }

    #[test]
    fn test_token_rejects_foreign_callback_data() {
        assert_eq!(SelectionToken::from_callback_data("menu:settings"), None);
        assert_eq!(SelectionToken::from_callback_data("dl:zz:1"), None);
        assert_eq!(SelectionToken::from_callback_data("dl:1f"), None);
    }

    #[test]
    fn test_raw_format_builders() {
        let raw = RawFormat::video("137", 1080).with_fps(60.0).with_size(10).with_ext("mp4");
        assert_eq!(raw.height, Some(1080));
        assert_eq!(raw.fps, Some(60.0));
        assert_eq!(raw.kind, MediaKind::Video);
        assert_eq!(RawFormat::audio("140").kind, MediaKind::Audio);
    }
}
