//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the worker:
//! - HTTP request metrics (latency, counts)
//! - Admission budget (collected dynamically)
//! - Everything `modfetch_core::metrics` defines

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "modfetch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("modfetch_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "modfetch_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Admission Metrics
// =============================================================================

/// Configured admission ceiling (collected dynamically).
pub static ADMISSION_CEILING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "modfetch_admission_ceiling",
        "Configured maximum in-flight fetch cost",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Admission
    registry
        .register(Box::new(ADMISSION_CEILING.clone()))
        .unwrap();

    // Core metrics (fetch, admission, queue)
    modfetch_core::metrics::register_metrics(registry);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let stats = state.admission_stats();
    ADMISSION_CEILING.set(i64::try_from(stats.ceiling).unwrap_or(i64::MAX));
}

/// Normalize a path for metric labels.
///
/// Module paths are unbounded, so everything after the action segment of
/// `/fetch/...` and `/schedule/...` collapses to a placeholder.
pub fn normalize_path(path: &str) -> String {
    let module_regex = regex_lite::Regex::new(r"^(/api/v1/(?:fetch|schedule))/.+$").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = module_regex.replace(path, "$1/{module}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}
