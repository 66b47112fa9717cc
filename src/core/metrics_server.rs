//! HTTP server for exposing Prometheus metrics
//!
//! Runs on its own port (METRICS_PORT, default 9090) next to the bot and stops
//! together with it.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::error::AppResult;

#[derive(Clone)]
struct AppState {
    start_time: Instant,
}

/// Binds `0.0.0.0:port` and serves until `cancel` fires.
pub async fn start_metrics_server(port: u16, cancel: CancellationToken) -> AppResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Starting metrics server on http://{}", addr);
    log::info!("  /metrics - Prometheus metrics");
    log::info!("  /health  - Health check");
    serve(listener, cancel).await
}

/// Serves the metrics routes on an already bound listener.
pub async fn serve(listener: TcpListener, cancel: CancellationToken) -> AppResult<()> {
    let state = AppState {
        start_time: Instant::now(),
    };
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    log::info!("Metrics server stopped");
    Ok(())
}

/// Current registry contents in the text exposition format
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

async fn metrics_handler() -> impl IntoResponse {
    match render() {
        Ok((content_type, body)) => (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain".to_string())],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health_status = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "dorafetch",
        "version": env!("CARGO_PKG_VERSION"),
    });

    (StatusCode::OK, axum::Json(health_status))
}
