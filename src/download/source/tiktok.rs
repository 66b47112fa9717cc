//! TikTokProvider: TikTok links through a tikwm-compatible JSON API.
//!
//! The API returns the no-watermark plays (HD and SD) and the music track but
//! no resolutions, so the plays are listed under nominal height classes.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::core::platform::{classify, Platform};
use crate::core::types::{FormatOption, MediaKind, RawFormat};
use crate::download::error::ProviderError;
use crate::download::source::{DirectLink, MediaProvider};

pub const NAME: &str = "tiktok";

pub const HD_FORMAT_ID: &str = "hd";
pub const SD_FORMAT_ID: &str = "sd";
pub const MUSIC_FORMAT_ID: &str = "music";

/// Nominal height class of the HD play
const HD_HEIGHT: u32 = 1080;
/// Nominal height class of the SD play
const SD_HEIGHT: u32 = 720;

#[derive(Debug, Deserialize)]
struct TikwmResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<TikwmData>,
}

#[derive(Debug, Deserialize)]
struct TikwmData {
    play: Option<String>,
    hdplay: Option<String>,
    music: Option<String>,
    size: Option<u64>,
    hd_size: Option<u64>,
}

fn non_empty(candidate: &Option<String>) -> Option<&str> {
    candidate.as_deref().filter(|u| !u.is_empty())
}

impl TikwmData {
    fn formats(&self) -> Vec<RawFormat> {
        let mut formats = Vec::new();
        if self.hdplay.as_deref().is_some_and(|u| !u.is_empty()) {
            let mut hd = RawFormat::video(HD_FORMAT_ID, HD_HEIGHT).with_ext("mp4");
            hd.filesize = self.hd_size.filter(|s| *s > 0);
            formats.push(hd);
        }
        if self.play.as_deref().is_some_and(|u| !u.is_empty()) {
            let mut sd = RawFormat::video(SD_FORMAT_ID, SD_HEIGHT).with_ext("mp4");
            sd.filesize = self.size.filter(|s| *s > 0);
            formats.push(sd);
        }
        if self.music.as_deref().is_some_and(|u| !u.is_empty()) {
            formats.push(RawFormat::audio(MUSIC_FORMAT_ID).with_ext("mp3"));
        }
        formats
    }

    /// Media URL for a format id; audio options without the music track fall back to the SD play
    fn url_for(&self, format: &FormatOption) -> Option<&str> {
        match (format.kind, format.id.as_str()) {
            (MediaKind::Audio, _) => non_empty(&self.music).or_else(|| non_empty(&self.play)),
            (MediaKind::Video, HD_FORMAT_ID) => non_empty(&self.hdplay).or_else(|| non_empty(&self.play)),
            (MediaKind::Video, _) => non_empty(&self.play).or_else(|| non_empty(&self.hdplay)),
        }
    }
}

/// TikTok-specialized provider
pub struct TikTokProvider {
    client: reqwest::Client,
    api_url: String,
}

impl TikTokProvider {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    async fn lookup(&self, url: &Url) -> Result<TikwmData, ProviderError> {
        if classify(url.as_str()) != Platform::TikTok {
            return Err(ProviderError::Unsupported);
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("url", url.as_str()), ("hd", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }

        let body: TikwmResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if body.code != 0 {
            return Err(ProviderError::Rejected(format!("code {}: {}", body.code, body.msg)));
        }
        body.data
            .ok_or_else(|| ProviderError::Malformed("response without data".to_string()))
    }

    /// Resolves possibly relative media paths against the API base.
    fn absolute(&self, raw: &str) -> Result<Url, ProviderError> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&self.api_url)
                .and_then(|base| base.join(raw))
                .map_err(|e| ProviderError::Malformed(format!("bad media url '{}': {}", raw, e))),
            Err(e) => Err(ProviderError::Malformed(format!("bad media url '{}': {}", raw, e))),
        }
    }
}

#[async_trait]
impl MediaProvider for TikTokProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn specialty(&self) -> Option<Platform> {
        Some(Platform::TikTok)
    }

    async fn probe(&self, url: &Url) -> Result<Vec<RawFormat>, ProviderError> {
        Ok(self.lookup(url).await?.formats())
    }

    async fn resolve_direct(&self, url: &Url, format: &FormatOption) -> Result<DirectLink, ProviderError> {
        let data = self.lookup(url).await?;
        let raw = data
            .url_for(format)
            .ok_or_else(|| ProviderError::Malformed(format!("no media url for format {}", format.id)))?;

        let is_music = format.is_audio() && data.music.as_deref().is_some_and(|u| u == raw);
        Ok(DirectLink {
            url: self.absolute(raw)?,
            ext: if is_music { "mp3" } else { "mp4" }.to_string(),
            kind: format.kind,
        })
    }
}
