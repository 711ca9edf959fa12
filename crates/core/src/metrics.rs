//! Prometheus metrics for benchmark runs.
//!
//! This module provides metrics for:
//! - Identifiers (processed, skipped, failed)
//! - Steps (duration and failures per pipeline step)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// =============================================================================
// Item Metrics
// =============================================================================

/// Identifiers handled, by result.
pub static ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("adder_bench_items_total", "Total identifiers handled"),
        &["result"], // "succeeded", "failed", "skipped"
    )
    .unwrap()
});

/// Total wall clock time spent on an identifier.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "adder_bench_item_duration_seconds",
            "Duration of all steps of one identifier",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Step Metrics
// =============================================================================

/// Step duration in seconds.
pub static STEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "adder_bench_step_duration_seconds",
            "Duration of a single external invocation",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]),
        &["step"],
    )
    .unwrap()
});

/// Step failures, by step and reason.
pub static STEP_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("adder_bench_step_failures_total", "Total failed invocations"),
        &["step", "reason"], // "exit_code", "not_found", "timeout", "io"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ITEMS_TOTAL.clone()),
        Box::new(ITEM_DURATION.clone()),
        Box::new(STEP_DURATION.clone()),
        Box::new(STEP_FAILURES.clone()),
    ]
}

/// Creates a registry holding all metrics.
pub fn registry() -> Registry {
    let registry = Registry::new();
    for metric in all_metrics() {
        if let Err(e) = registry.register(metric) {
            tracing::warn!("Failed to register metric: {}", e);
        }
    }
    registry
}
