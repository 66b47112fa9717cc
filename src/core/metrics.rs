//! Prometheus metrics for the resolution and retrieval pipeline
//!
//! Tracks:
//! - Provider attempts and chain outcomes per platform
//! - Transfer volume, retries and size-gate rejections
//! - Artifact cleanup (request-scoped and swept)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_counter_vec, CounterVec,
    HistogramVec, IntCounter, IntCounterVec,
};

lazy_static! {
    /// Provider calls by provider and outcome
    /// Labels: provider (ytdlp/cobalt/...), outcome (resolved/unsupported/failed)
    pub static ref PROVIDER_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "dorafetch_provider_attempts_total",
        "Provider probe/resolve calls by outcome",
        &["provider", "outcome"]
    )
    .unwrap();

    /// Provider call latency
    /// Labels: provider
    pub static ref PROVIDER_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "dorafetch_provider_duration_seconds",
        "Time spent in a single provider call",
        &["provider"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]
    )
    .unwrap();

    /// Chain resolutions by platform and result
    /// Labels: platform, result (resolved/exhausted)
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "dorafetch_resolutions_total",
        "Provider chain results by platform",
        &["platform", "result"]
    )
    .unwrap();

    /// Bytes written to disk by the fetcher
    /// Labels: kind (video/audio)
    pub static ref FETCHED_BYTES_TOTAL: CounterVec = register_counter_vec!(
        "dorafetch_fetched_bytes_total",
        "Bytes streamed to local storage",
        &["kind"]
    )
    .unwrap();

    /// Retries by attempt number
    pub static ref RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "dorafetch_retries_total",
        "Retried operations by attempt number",
        &["attempt"]
    )
    .unwrap();

    /// Request outcomes
    /// Labels: result (delivered/error kind)
    pub static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "dorafetch_requests_total",
        "Finished user requests by result",
        &["result"]
    )
    .unwrap();

    /// Artifacts rejected by the size gate
    pub static ref SIZE_GATE_REJECTIONS_TOTAL: IntCounter = register_int_counter!(
        "dorafetch_size_gate_rejections_total",
        "Artifacts rejected for exceeding the delivery ceiling"
    )
    .unwrap();

    /// Artifacts deleted by the periodic sweeper
    pub static ref ARTIFACTS_SWEPT_TOTAL: IntCounter = register_int_counter!(
        "dorafetch_artifacts_swept_total",
        "Stale artifacts removed by the sweeper"
    )
    .unwrap();
}

/// Records the outcome of one provider call.
pub fn record_provider_attempt(provider: &str, outcome: &str, elapsed_secs: f64) {
    PROVIDER_ATTEMPTS_TOTAL.with_label_values(&[provider, outcome]).inc();
    PROVIDER_DURATION_SECONDS
        .with_label_values(&[provider])
        .observe(elapsed_secs);
}

/// Records a finished user request.
pub fn record_request(result: &str) {
    REQUESTS_TOTAL.with_label_values(&[result]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_provider_attempt_increments() {
        let before = PROVIDER_ATTEMPTS_TOTAL.with_label_values(&["test-provider", "failed"]).get();
        record_provider_attempt("test-provider", "failed", 0.1);
        let after = PROVIDER_ATTEMPTS_TOTAL.with_label_values(&["test-provider", "failed"]).get();
        assert_eq!(after, before + 1);
    }
}
