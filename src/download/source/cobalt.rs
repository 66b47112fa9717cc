//! CobaltProvider: direct-only extraction through a cobalt API instance.
//!
//! Cobalt cannot list formats, so the chain offers the canned tiers and asks
//! cobalt for a tunnel/redirect URL once the user picks one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::types::{FormatOption, MediaKind, RawFormat};
use crate::download::error::ProviderError;
use crate::download::formats::AUDIO_CONTAINER;
use crate::download::source::{default_canned_tiers, DirectLink, MediaProvider};

pub const NAME: &str = "cobalt";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CobaltRequest<'a> {
    url: &'a str,
    video_quality: String,
    download_mode: &'static str,
    audio_format: &'static str,
    filename_style: &'static str,
}

#[derive(Debug, Deserialize)]
struct CobaltResponse {
    status: String,
    url: Option<String>,
    filename: Option<String>,
    #[serde(default)]
    picker: Vec<CobaltPickerItem>,
    error: Option<CobaltErrorBody>,
}

#[derive(Debug, Deserialize)]
struct CobaltPickerItem {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct CobaltErrorBody {
    code: String,
}

fn build_request<'a>(url: &'a Url, format: &FormatOption) -> CobaltRequest<'a> {
    let video_quality = match format.height_class {
        0 => "max".to_string(),
        h => h.to_string(),
    };
    CobaltRequest {
        url: url.as_str(),
        video_quality,
        download_mode: if format.is_audio() { "audio" } else { "auto" },
        audio_format: AUDIO_CONTAINER,
        filename_style: "basic",
    }
}

fn extension_of(filename: Option<&str>, kind: MediaKind) -> String {
    filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .unwrap_or_else(|| match kind {
            MediaKind::Audio => AUDIO_CONTAINER.to_string(),
            MediaKind::Video => "mp4".to_string(),
        })
}

fn link_from_response(response: CobaltResponse, kind: MediaKind) -> Result<DirectLink, ProviderError> {
    let raw_url = match response.status.as_str() {
        "tunnel" | "redirect" | "stream" => response
            .url
            .ok_or_else(|| ProviderError::Malformed("cobalt response without url".to_string()))?,
        "picker" => {
            let wanted = if kind == MediaKind::Audio { "audio" } else { "video" };
            response
                .picker
                .iter()
                .find(|item| item.kind.as_deref() == Some(wanted))
                .or_else(|| response.picker.first())
                .map(|item| item.url.clone())
                .ok_or_else(|| ProviderError::Malformed("cobalt picker is empty".to_string()))?
        }
        "error" => {
            let code = response.error.map(|e| e.code).unwrap_or_default();
            return if code.contains("unsupported") {
                Err(ProviderError::Unsupported)
            } else {
                Err(ProviderError::Rejected(code))
            };
        }
        other => return Err(ProviderError::Malformed(format!("unknown cobalt status '{}'", other))),
    };

    let url = Url::parse(&raw_url).map_err(|e| ProviderError::Malformed(format!("bad cobalt url: {}", e)))?;
    Ok(DirectLink {
        url,
        ext: extension_of(response.filename.as_deref(), kind),
        kind,
    })
}

/// Direct-only provider backed by a cobalt instance.
pub struct CobaltProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl CobaltProvider {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl MediaProvider for CobaltProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn resolve_direct(&self, url: &Url, format: &FormatOption) -> Result<DirectLink, ProviderError> {
        let mut request = self
            .client
            .post(&self.api_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&build_request(url, format));
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Api-Key {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        // cobalt reports its own errors as JSON with a 4xx status
        let body: CobaltResponse = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(ProviderError::HttpStatus(status)),
            Err(e) => return Err(ProviderError::Malformed(e.to_string())),
        };

        link_from_response(body, format.kind)
    }

    fn canned_tiers(&self) -> Vec<RawFormat> {
        default_canned_tiers()
    }
}
