//! DirectProvider: plain media file URLs (e.g. `https://example.com/clip.mp4`).
//!
//! Claims only URLs whose path ends in a known media extension; a HEAD request
//! supplies the size, and the URL itself is the fetchable source.

use async_trait::async_trait;
use url::Url;

use crate::core::types::{FormatOption, MediaKind, RawFormat};
use crate::download::error::ProviderError;
use crate::download::source::{DirectLink, MediaProvider};

pub const NAME: &str = "direct";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov", "avi", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "ogg", "opus", "wav", "flac"];

/// File format id reported for a direct file
pub const FILE_FORMAT_ID: &str = "file";

/// Media extension and kind of a direct file URL, if it is one.
pub fn media_extension(url: &Url) -> Option<(String, MediaKind)> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let last = url.path_segments()?.next_back()?.to_lowercase();
    let (_, ext) = last.rsplit_once('.')?;

    if VIDEO_EXTENSIONS.contains(&ext) {
        Some((ext.to_string(), MediaKind::Video))
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some((ext.to_string(), MediaKind::Audio))
    } else {
        None
    }
}

/// Provider for direct media file links
pub struct DirectProvider {
    client: reqwest::Client,
}

impl DirectProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaProvider for DirectProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn probe(&self, url: &Url) -> Result<Vec<RawFormat>, ProviderError> {
        let (ext, kind) = media_extension(url).ok_or(ProviderError::Unsupported)?;

        let response = self.client.head(url.as_str()).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/html"));
        if is_html {
            return Err(ProviderError::Malformed("link serves an HTML page, not media".to_string()));
        }

        // Content-Length of a HEAD response; reqwest's content_length() sees the empty body
        let size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|s| *s > 0);

        let mut format = RawFormat {
            format_id: FILE_FORMAT_ID.to_string(),
            ext: Some(ext),
            kind,
            ..Default::default()
        };
        format.filesize = size;
        Ok(vec![format])
    }

    async fn resolve_direct(&self, url: &Url, format: &FormatOption) -> Result<DirectLink, ProviderError> {
        let (ext, _) = media_extension(url).ok_or(ProviderError::Unsupported)?;
        Ok(DirectLink {
            url: url.clone(),
            ext,
            kind: format.kind,
        })
    }
}
