//! Multi-backend extraction layer.
//!
//! Provides the `MediaProvider` trait for pluggable extraction backends and the
//! `ProviderChain` that tries them in priority order. New backends are added by
//! implementing `MediaProvider` and listing their name in `PROVIDERS`.
//!
//! Built-in backends:
//! - `TikTokProvider`: TikTok-specialized JSON API (no-watermark plays)
//! - `YtDlpProvider`: 1000+ sites via yt-dlp; downloads through yt-dlp itself
//! - `CobaltProvider`: direct-only JSON API with canned quality tiers
//! - `DirectProvider`: plain media file URLs

pub mod cobalt;
pub mod http;
pub mod tiktok;
pub mod ytdlp;

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::core::config;
use crate::core::error::PipelineError;
use crate::core::metrics;
use crate::core::platform::Platform;
use crate::core::types::{FormatOption, MediaKind, RawFormat};
use crate::download::error::ProviderError;
use crate::download::formats::{self, AUDIO_FORMAT_ID};
use crate::download::pool::BlockingPool;

/// A media location the HTTP fetcher can stream from.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectLink {
    pub url: Url,
    /// File extension for the local artifact
    pub ext: String,
    pub kind: MediaKind,
}

/// Where the bytes for a selection come from.
#[derive(Clone)]
pub enum DirectSource {
    /// Streamed by the fetcher's HTTP client
    Url(DirectLink),
    /// Downloaded by the provider itself (yt-dlp)
    Managed {
        provider: Arc<dyn MediaProvider>,
        url: Url,
        format: FormatOption,
    },
}

impl fmt::Debug for DirectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectSource::Url(link) => f.debug_tuple("Url").field(link).finish(),
            DirectSource::Managed { provider, url, format } => f
                .debug_struct("Managed")
                .field("provider", &provider.name())
                .field("url", &url.as_str())
                .field("format", &format.id)
                .finish(),
        }
    }
}

/// Extraction backend.
///
/// Every operation is optional: a provider implements the subset its backend
/// supports and leaves the rest returning `ProviderError::Unsupported`.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Short stable name used in configuration, logs and metrics
    fn name(&self) -> &str;

    /// Platform this provider is specialized for; moved to the front of the chain on a match
    fn specialty(&self) -> Option<Platform> {
        None
    }

    /// Lists the formats available for `url`.
    async fn probe(&self, _url: &Url) -> Result<Vec<RawFormat>, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    /// Resolves a chosen option to a directly fetchable URL.
    async fn resolve_direct(&self, _url: &Url, _format: &FormatOption) -> Result<DirectLink, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    /// Whether selections are fetched through `download` instead of `resolve_direct`
    fn manages_download(&self) -> bool {
        false
    }

    /// Downloads the chosen option into `dest_dir` and returns the file path.
    async fn download(&self, _url: &Url, _format: &FormatOption, _dest_dir: &Path) -> Result<PathBuf, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    /// Fixed quality tiers offered when the provider cannot list formats
    fn canned_tiers(&self) -> Vec<RawFormat> {
        Vec::new()
    }
}

/// Tiers offered by direct-only providers
pub fn default_canned_tiers() -> Vec<RawFormat> {
    vec![
        RawFormat::video("1080", 1080),
        RawFormat::video("720", 720),
        RawFormat::video("480", 480),
        RawFormat::audio(AUDIO_FORMAT_ID),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Resolved,
    Unsupported,
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Resolved => "resolved",
            AttemptOutcome::Unsupported => "unsupported",
            AttemptOutcome::Failed => "failed",
        }
    }
}

/// Result of asking one provider about one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub detail: Option<String>,
}

/// Successful pass over the chain
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Name of the provider that produced the formats
    pub provider: String,
    pub formats: Vec<RawFormat>,
    pub attempts: Vec<ProviderAttempt>,
}

/// Ordered list of providers tried one after another until one resolves.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn MediaProvider>>,
    call_timeout: Duration,
}

impl Default for ProviderChain {
    fn default() -> Self {
        Self::new(config::provider::call_timeout())
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.names())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ProviderChain {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            providers: Vec::new(),
            call_timeout,
        }
    }

    /// Appends a provider. Providers are tried in insertion order.
    pub fn register(&mut self, provider: Arc<dyn MediaProvider>) {
        self.providers.push(provider);
    }

    #[must_use]
    pub fn with(mut self, provider: Arc<dyn MediaProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn MediaProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Providers in the order they are tried for `platform`: specialists first,
    /// everyone else after, relative order preserved in both groups.
    pub fn ordered_for(&self, platform: Platform) -> Vec<Arc<dyn MediaProvider>> {
        let (mut first, rest): (Vec<_>, Vec<_>) = self
            .providers
            .iter()
            .cloned()
            .partition(|p| platform != Platform::Unknown && p.specialty() == Some(platform));
        first.extend(rest);
        first
    }

    /// Runs one pass over the chain for `url`.
    ///
    /// Stops at the first provider that yields formats. Individual failures are
    /// logged and counted but never surface; only exhaustion does.
    pub async fn resolve(&self, url: &Url, platform: Platform) -> Result<Resolution, PipelineError> {
        if self.providers.is_empty() {
            return Err(PipelineError::UnsupportedUrl(url.to_string()));
        }

        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in self.ordered_for(platform) {
            let started = Instant::now();
            let result = self.try_provider(provider.as_ref(), url).await;
            let elapsed = started.elapsed().as_secs_f64();

            let attempt = match result {
                Ok(formats) if !formats.is_empty() => {
                    metrics::record_provider_attempt(provider.name(), AttemptOutcome::Resolved.as_str(), elapsed);
                    metrics::RESOLUTIONS_TOTAL
                        .with_label_values(&[platform.as_str(), "resolved"])
                        .inc();
                    log::info!(
                        "{} resolved {} ({}) with {} format(s) in {:.2}s",
                        provider.name(),
                        url,
                        platform,
                        formats.len(),
                        elapsed
                    );
                    attempts.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        outcome: AttemptOutcome::Resolved,
                        detail: None,
                    });
                    return Ok(Resolution {
                        provider: provider.name().to_string(),
                        formats,
                        attempts,
                    });
                }
                Ok(_) => ProviderAttempt {
                    provider: provider.name().to_string(),
                    outcome: AttemptOutcome::Unsupported,
                    detail: Some("no formats".to_string()),
                },
                Err(e) => {
                    let outcome = e.outcome();
                    let detail = match outcome {
                        AttemptOutcome::Unsupported => None,
                        _ => {
                            log::warn!("Provider {} failed for {}: {}", provider.name(), url, e);
                            Some(e.to_string())
                        }
                    };
                    ProviderAttempt {
                        provider: provider.name().to_string(),
                        outcome,
                        detail,
                    }
                }
            };

            metrics::record_provider_attempt(provider.name(), attempt.outcome.as_str(), elapsed);
            attempts.push(attempt);
        }

        metrics::RESOLUTIONS_TOTAL
            .with_label_values(&[platform.as_str(), "exhausted"])
            .inc();
        log::warn!(
            "All providers exhausted for {} ({}): {}",
            url,
            platform,
            attempts
                .iter()
                .map(|a| format!("{}={}", a.provider, a.outcome.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Err(PipelineError::AllProvidersExhausted {
            attempted: attempts.len(),
        })
    }

    /// Probe, or for direct-only providers, a resolve check followed by the canned tiers.
    async fn try_provider(&self, provider: &dyn MediaProvider, url: &Url) -> Result<Vec<RawFormat>, ProviderError> {
        match self.bounded(provider.probe(url)).await {
            Err(ProviderError::Unsupported) => {
                let tiers = provider.canned_tiers();
                if tiers.is_empty() {
                    return Err(ProviderError::Unsupported);
                }
                let best = formats::normalize(&tiers).swap_remove(0);
                self.bounded(provider.resolve_direct(url, &best)).await?;
                Ok(tiers)
            }
            other => other,
        }
    }

    /// Resolves a stored selection through the provider that listed it.
    pub async fn resolve_source(
        &self,
        provider_name: &str,
        url: &Url,
        format: &FormatOption,
    ) -> Result<DirectSource, ProviderError> {
        let provider = self.find(provider_name).ok_or(ProviderError::Unsupported)?;

        if provider.manages_download() {
            return Ok(DirectSource::Managed {
                provider,
                url: url.clone(),
                format: format.clone(),
            });
        }

        let link = self.bounded(provider.resolve_direct(url, format)).await?;
        Ok(DirectSource::Url(link))
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or(Err(ProviderError::Timeout(self.call_timeout)))
    }
}

/// Shared HTTP client for JSON-API providers
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("dorafetch/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(config::fetch::connect_timeout())
        .timeout(config::provider::call_timeout())
        .build()
}

/// Builds the chain from provider names, skipping unknown or unconfigured ones.
pub fn build_chain(names: &[String], client: reqwest::Client, pool: BlockingPool) -> ProviderChain {
    let mut chain = ProviderChain::default();

    for name in names {
        match name.as_str() {
            ytdlp::NAME => chain.register(Arc::new(ytdlp::YtDlpProvider::new(pool.clone()))),
            tiktok::NAME => chain.register(Arc::new(tiktok::TikTokProvider::new(
                client.clone(),
                config::providers::TIKTOK_API_URL.as_str(),
            ))),
            cobalt::NAME => match config::providers::COBALT_API_URL.as_deref() {
                Some(api_url) => chain.register(Arc::new(cobalt::CobaltProvider::new(
                    client.clone(),
                    api_url,
                    config::providers::COBALT_API_KEY.clone(),
                ))),
                None => log::warn!("Provider cobalt listed but COBALT_API_URL is not set; skipping"),
            },
            http::NAME => chain.register(Arc::new(http::DirectProvider::new(client.clone()))),
            other => log::warn!("Unknown provider '{}' in PROVIDERS; skipping", other),
        }
    }

    log::info!("Provider chain: [{}]", chain.names().join(", "));
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        specialty: Option<Platform>,
        probe: fn() -> Result<Vec<RawFormat>, ProviderError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, probe: fn() -> Result<Vec<RawFormat>, ProviderError>) -> Self {
            Self {
                name,
                specialty: None,
                probe,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn specialty(&self) -> Option<Platform> {
            self.specialty
        }

        async fn probe(&self, _url: &Url) -> Result<Vec<RawFormat>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            (self.probe)()
        }
    }

    struct DirectOnly;

    #[async_trait]
    impl MediaProvider for DirectOnly {
        fn name(&self) -> &str {
            "direct-only"
        }

        async fn resolve_direct(&self, url: &Url, format: &FormatOption) -> Result<DirectLink, ProviderError> {
            assert_eq!(format.height_class, 1080, "verification uses the best tier");
            Ok(DirectLink {
                url: url.clone(),
                ext: "mp4".to_string(),
                kind: MediaKind::Video,
            })
        }

        fn canned_tiers(&self) -> Vec<RawFormat> {
            default_canned_tiers()
        }
    }

    fn url() -> Url {
        Url::parse("https://www.youtube.com/watch?v=abc").unwrap()
    }

    fn ok_formats() -> Result<Vec<RawFormat>, ProviderError> {
        Ok(vec![RawFormat::video("22", 720)])
    }

    fn unsupported() -> Result<Vec<RawFormat>, ProviderError> {
        Err(ProviderError::Unsupported)
    }

    fn malformed() -> Result<Vec<RawFormat>, ProviderError> {
        Err(ProviderError::Malformed("bad json".into()))
    }

    #[tokio::test]
    async fn test_empty_chain_is_unsupported_url() {
        let chain = ProviderChain::new(Duration::from_secs(1));
        let err = chain.resolve(&url(), Platform::YouTube).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedUrl(_)));
    }

    #[tokio::test]
    async fn test_falls_through_failures_to_first_success() {
        let third = Arc::new(Scripted::new("third", ok_formats));
        let chain = ProviderChain::new(Duration::from_secs(1))
            .with(Arc::new(Scripted::new("first", malformed)))
            .with(Arc::new(Scripted::new("second", ok_formats)))
            .with(third.clone());

        let resolution = chain.resolve(&url(), Platform::YouTube).await.unwrap();
        assert_eq!(resolution.provider, "second");
        assert_eq!(resolution.attempts.len(), 2);
        assert_eq!(resolution.attempts[0].outcome, AttemptOutcome::Failed);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_when_all_fail() {
        let chain = ProviderChain::new(Duration::from_secs(1))
            .with(Arc::new(Scripted::new("a", unsupported)))
            .with(Arc::new(Scripted::new("b", malformed)));

        let err = chain.resolve(&url(), Platform::Unknown).await.unwrap_err();
        assert!(matches!(err, PipelineError::AllProvidersExhausted { attempted: 2 }));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure_and_chain_continues() {
        let mut slow = Scripted::new("slow", ok_formats);
        slow.delay = Duration::from_secs(5);
        let chain = ProviderChain::new(Duration::from_millis(50))
            .with(Arc::new(slow))
            .with(Arc::new(Scripted::new("fast", ok_formats)));

        let resolution = chain.resolve(&url(), Platform::YouTube).await.unwrap();
        assert_eq!(resolution.provider, "fast");
        assert_eq!(resolution.attempts[0].outcome, AttemptOutcome::Failed);
    }

    #[tokio::test]
    async fn test_specialists_move_to_front() {
        let mut tiktok = Scripted::new("tiktok", ok_formats);
        tiktok.specialty = Some(Platform::TikTok);
        let chain = ProviderChain::new(Duration::from_secs(1))
            .with(Arc::new(Scripted::new("generic", ok_formats)))
            .with(Arc::new(tiktok));

        let names = |platform| {
            chain
                .ordered_for(platform)
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Platform::TikTok), vec!["tiktok", "generic"]);
        assert_eq!(names(Platform::YouTube), vec!["generic", "tiktok"]);
        assert_eq!(names(Platform::Unknown), vec!["generic", "tiktok"]);
    }

    #[tokio::test]
    async fn test_direct_only_provider_offers_canned_tiers() {
        let chain = ProviderChain::new(Duration::from_secs(1)).with(Arc::new(DirectOnly));
        let resolution = chain.resolve(&url(), Platform::YouTube).await.unwrap();
        assert_eq!(resolution.provider, "direct-only");
        assert_eq!(resolution.formats, default_canned_tiers());
    }

    #[tokio::test]
    async fn test_resolve_source_unknown_provider() {
        let chain = ProviderChain::new(Duration::from_secs(1));
        let option = formats::best_available_option();
        let err = chain.resolve_source("gone", &url(), &option).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported));
    }

    #[tokio::test]
    async fn test_resolve_source_direct_link() {
        let chain = ProviderChain::new(Duration::from_secs(1)).with(Arc::new(DirectOnly));
        let option = formats::normalize(&default_canned_tiers()).remove(0);
        let source = chain.resolve_source("direct-only", &url(), &option).await.unwrap();
        assert!(matches!(source, DirectSource::Url(link) if link.ext == "mp4"));
    }
}
