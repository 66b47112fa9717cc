//! Fetcher behaviour against a mock media host: retries, content checks,
//! timeouts and removal of partial files.

mod common;

use common::quick_retry;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dorafetch::core::types::{FormatOption, MediaKind};
use dorafetch::download::error::{FetchError, ProviderError};
use dorafetch::download::fetch::Fetcher;
use dorafetch::download::formats::best_available_option;
use dorafetch::download::pool::BlockingPool;
use dorafetch::download::source::{DirectLink, DirectSource, MediaProvider};

fn fetcher(dir: &TempDir) -> Fetcher {
    Fetcher::new(reqwest::Client::new(), dir.path(), BlockingPool::new(1))
        .with_retry(quick_retry().max_retries(2))
        .with_read_timeout(Duration::from_secs(5))
}

fn video_source(server: &MockServer, route: &str) -> DirectSource {
    DirectSource::Url(DirectLink {
        url: Url::parse(&format!("{}{}", server.uri(), route)).unwrap(),
        ext: "mp4".to_string(),
        kind: MediaKind::Video,
    })
}

fn video_option() -> FormatOption {
    best_available_option()
}

fn entries(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[tokio::test]
async fn test_streams_body_to_unique_file() {
    let server = MockServer::start().await;
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/clip.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(body.clone()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let fetcher = fetcher(&dir);

    let first = fetcher
        .fetch(video_source(&server, "/clip.mp4"), &video_option())
        .await
        .unwrap();
    let second = fetcher
        .fetch(video_source(&server, "/clip.mp4"), &video_option())
        .await
        .unwrap();

    assert_ne!(first.path, second.path);
    assert_eq!(first.size_bytes, body.len() as u64);
    assert_eq!(first.kind, MediaKind::Video);
    assert_eq!(std::fs::read(&first.path).unwrap(), body);
    assert_eq!(first.path.extension().and_then(|e| e.to_str()), Some("mp4"));
}

#[tokio::test]
async fn test_retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let artifact = fetcher(&dir)
        .fetch(video_source(&server, "/flaky.mp4"), &video_option())
        .await
        .unwrap();

    assert_eq!(artifact.size_bytes, 64);
    assert_eq!(entries(&dir), 1);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = fetcher(&dir)
        .fetch(video_source(&server, "/gone.mp4"), &video_option())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Permanent(_)), "{:?}", err);
    assert_eq!(entries(&dir), 0);
}

#[tokio::test]
async fn test_exhausted_retries_leave_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down.mp4"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = fetcher(&dir)
        .fetch(video_source(&server, "/down.mp4"), &video_option())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transient(_)), "{:?}", err);
    assert_eq!(entries(&dir), 0);
}

#[tokio::test]
async fn test_html_page_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html>sign in</html>", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = fetcher(&dir)
        .fetch(video_source(&server, "/login"), &video_option())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Permanent(_)));
    assert_eq!(entries(&dir), 0);
}

#[tokio::test]
async fn test_stalled_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stall.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 16])
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let fetcher = Fetcher::new(reqwest::Client::new(), dir.path(), BlockingPool::new(1))
        .with_retry(quick_retry().max_retries(0))
        .with_read_timeout(Duration::from_millis(100));

    let err = fetcher
        .fetch(video_source(&server, "/stall.mp4"), &video_option())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::ReadTimeout(_)), "{:?}", err);
    assert_eq!(entries(&dir), 0);
}

/// Stands in for yt-dlp: writes the file itself instead of handing out a URL
struct WritesOwnFile;

#[async_trait::async_trait]
impl MediaProvider for WritesOwnFile {
    fn name(&self) -> &str {
        "writes-own-file"
    }

    fn manages_download(&self) -> bool {
        true
    }

    async fn download(&self, _url: &Url, format: &FormatOption, dest_dir: &Path) -> Result<PathBuf, ProviderError> {
        let path = dest_dir.join(format!("managed.{}", format.container_ext));
        tokio::fs::write(&path, vec![9u8; 512]).await?;
        Ok(path)
    }
}

#[tokio::test]
async fn test_managed_source_is_downloaded_by_its_provider() {
    let dir = TempDir::new().unwrap();
    let source = DirectSource::Managed {
        provider: Arc::new(WritesOwnFile),
        url: Url::parse("https://www.youtube.com/watch?v=abc").unwrap(),
        format: video_option(),
    };

    let artifact = fetcher(&dir).fetch(source, &video_option()).await.unwrap();

    assert_eq!(artifact.path, dir.path().join("managed.mp4"));
    assert_eq!(artifact.size_bytes, 512);
    assert_eq!(artifact.kind, MediaKind::Video);
}
