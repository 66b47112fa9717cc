//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

use dorafetch::core::error::ErrorKind;
use dorafetch::core::platform::Platform;
use dorafetch::core::retry::RetryConfig;
use dorafetch::core::types::{FormatOption, MediaKind, RawFormat, SelectionToken, UserId};
use dorafetch::download::error::{DeliveryError, ProviderError};
use dorafetch::download::fetch::Fetcher;
use dorafetch::download::pipeline::{FrontEnd, Pipeline, PipelineConfig};
use dorafetch::download::pool::BlockingPool;
use dorafetch::download::source::{DirectLink, MediaProvider, ProviderChain};
use dorafetch::storage::SessionStore;

/// What the front end saw for one delivered file
#[derive(Debug, Clone)]
pub struct Delivery {
    pub user_id: UserId,
    pub path: PathBuf,
    pub kind: MediaKind,
    pub caption: String,
    /// Size of the file at the moment it was handed over
    pub size_at_delivery: Option<u64>,
}

/// Records every call the pipeline makes into the front end
#[derive(Default)]
pub struct MockFrontEnd {
    pub presented: Mutex<Vec<(UserId, Platform, Vec<(SelectionToken, FormatOption)>)>>,
    pub delivered: Mutex<Vec<Delivery>>,
    pub errors: Mutex<Vec<(UserId, ErrorKind, String)>>,
    fail_delivery: bool,
}

impl MockFrontEnd {
    pub fn failing_delivery() -> Self {
        Self {
            fail_delivery: true,
            ..Self::default()
        }
    }

    /// Options from the most recent presentation to `user_id`
    pub fn last_options(&self, user_id: UserId) -> Vec<(SelectionToken, FormatOption)> {
        self.presented
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(user, _, _)| *user == user_id)
            .map(|(_, _, options)| options.clone())
            .unwrap_or_default()
    }

    pub fn error_kinds(&self) -> Vec<ErrorKind> {
        self.errors.lock().unwrap().iter().map(|(_, kind, _)| *kind).collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl FrontEnd for MockFrontEnd {
    async fn present_options(
        &self,
        user_id: UserId,
        platform: Platform,
        options: &[(SelectionToken, FormatOption)],
    ) -> Result<(), DeliveryError> {
        self.presented
            .lock()
            .unwrap()
            .push((user_id, platform, options.to_vec()));
        Ok(())
    }

    async fn deliver_artifact(
        &self,
        user_id: UserId,
        path: &Path,
        kind: MediaKind,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        let size_at_delivery = std::fs::metadata(path).ok().map(|m| m.len());
        self.delivered.lock().unwrap().push(Delivery {
            user_id,
            path: path.to_path_buf(),
            kind,
            caption: caption.to_string(),
            size_at_delivery,
        });
        if self.fail_delivery {
            return Err(DeliveryError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    async fn report_error(&self, user_id: UserId, kind: ErrorKind, message: &str) {
        self.errors.lock().unwrap().push((user_id, kind, message.to_string()));
    }
}

/// How a `ScriptedProvider` answers `probe`
#[derive(Debug, Clone)]
pub enum Script {
    Formats(Vec<RawFormat>),
    Unsupported,
    Fail,
    Hang,
}

/// Provider with canned behaviour whose direct links point at a mock server
pub struct ScriptedProvider {
    name: String,
    script: Script,
    media_base: Option<String>,
    audio_ext: Option<String>,
    pub probes: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            media_base: None,
            audio_ext: None,
            probes: AtomicUsize::new(0),
        }
    }

    /// Direct links resolve to `{base}/media/{format_id}.{ext}`
    pub fn serving_from(mut self, base: &str) -> Self {
        self.media_base = Some(base.trim_end_matches('/').to_string());
        self
    }

    /// Serve audio selections with this extension instead of mp3
    pub fn with_audio_ext(mut self, ext: &str) -> Self {
        self.audio_ext = Some(ext.to_string());
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, _url: &Url) -> Result<Vec<RawFormat>, ProviderError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Formats(formats) => Ok(formats.clone()),
            Script::Unsupported => Err(ProviderError::Unsupported),
            Script::Fail => Err(ProviderError::Malformed("scripted failure".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(vec![RawFormat::video("never", 720)])
            }
        }
    }

    async fn resolve_direct(&self, _url: &Url, format: &FormatOption) -> Result<DirectLink, ProviderError> {
        let base = self.media_base.as_deref().ok_or(ProviderError::Unsupported)?;
        let ext = match (&self.audio_ext, format.kind) {
            (Some(ext), MediaKind::Audio) => ext.clone(),
            _ => format.container_ext.clone(),
        };
        let url = Url::parse(&format!("{}/media/{}.{}", base, format.id, ext))
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(DirectLink {
            url,
            ext,
            kind: format.kind,
        })
    }
}

/// Fast retries so failure paths finish quickly
pub fn quick_retry() -> RetryConfig {
    RetryConfig::new()
        .max_retries(1)
        .initial_delay(Duration::from_millis(10))
        .no_jitter()
}

/// A pipeline wired to a mock front end and a private download folder
pub struct Harness {
    pub pipeline: Pipeline,
    pub front: Arc<MockFrontEnd>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(chain: ProviderChain, max_file_size: u64) -> Self {
        Self::with_front(chain, max_file_size, MockFrontEnd::default())
    }

    pub fn with_front(chain: ProviderChain, max_file_size: u64, front: MockFrontEnd) -> Self {
        let dir = TempDir::new().unwrap();
        let front = Arc::new(front);
        let fetcher = Fetcher::new(reqwest::Client::new(), dir.path(), BlockingPool::new(2))
            .with_retry(quick_retry())
            .with_read_timeout(Duration::from_secs(5))
            .with_ffmpeg_bin("dorafetch-test-missing-ffmpeg");
        let config = PipelineConfig {
            max_file_size,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(
            chain,
            Arc::new(SessionStore::default()),
            fetcher,
            front.clone(),
            config,
        );
        Self { pipeline, front, dir }
    }

    /// Number of entries left in the download folder
    pub fn files_left(&self) -> usize {
        std::fs::read_dir(self.dir.path()).map(|entries| entries.count()).unwrap_or(0)
    }
}

pub fn chain_of(providers: Vec<Arc<dyn MediaProvider>>) -> ProviderChain {
    providers
        .into_iter()
        .fold(ProviderChain::new(Duration::from_secs(5)), |chain, provider| chain.with(provider))
}
