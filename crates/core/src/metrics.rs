//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Fetch outcomes and per-step latency
//! - Admission control (reserved cost, shed requests)
//! - Queue scheduling

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

// =============================================================================
// Fetch Metrics
// =============================================================================

/// Completed fetch attempts by status and request source.
pub static FETCH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("modfetch_fetch_outcomes_total", "Completed fetch attempts"),
        &["status", "source"],
    )
    .unwrap()
});

/// End-to-end fetch duration in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "modfetch_fetch_duration_seconds",
            "Duration of fetch_and_update_state",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["status"],
    )
    .unwrap()
});

/// Duration of individual pipeline steps in seconds.
pub static FETCH_STEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "modfetch_fetch_step_duration_seconds",
            "Duration of individual fetch pipeline steps",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &["step"],
    )
    .unwrap()
});

// =============================================================================
// Admission Metrics
// =============================================================================

/// Cost currently reserved by in-flight fetches.
pub static ADMISSION_RESERVED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "modfetch_admission_reserved",
        "Cost units currently reserved by in-flight fetches",
    )
    .unwrap()
});

/// Reservations refused because the budget was exhausted.
pub static ADMISSION_SHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "modfetch_admission_shed_total",
        "Reservations refused by the admission controller",
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics
// =============================================================================

/// Schedule requests by backend, source and result.
pub static QUEUE_SCHEDULED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("modfetch_queue_scheduled_total", "Schedule requests"),
        &["backend", "source", "result"], // "enqueued", "duplicate", "error"
    )
    .unwrap()
});

/// Tasks that hit the per-task timeout in the in-memory worker pool.
pub static QUEUE_TASK_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "modfetch_queue_task_timeouts_total",
        "Worker tasks that exceeded their timeout",
    )
    .unwrap()
});

/// Register every core metric with `registry`.
pub fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(FETCH_OUTCOMES.clone()))
        .expect("register fetch outcomes");
    registry
        .register(Box::new(FETCH_DURATION.clone()))
        .expect("register fetch duration");
    registry
        .register(Box::new(FETCH_STEP_DURATION.clone()))
        .expect("register fetch step duration");
    registry
        .register(Box::new(ADMISSION_RESERVED.clone()))
        .expect("register admission reserved");
    registry
        .register(Box::new(ADMISSION_SHED.clone()))
        .expect("register admission shed");
    registry
        .register(Box::new(QUEUE_SCHEDULED.clone()))
        .expect("register queue scheduled");
    registry
        .register(Box::new(QUEUE_TASK_TIMEOUTS.clone()))
        .expect("register queue timeouts");
}
