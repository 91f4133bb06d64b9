//! Prometheus metrics for signing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for workflow transition attempts by action and outcome/kind.
pub static TRANSITIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "signing_transitions_total",
        "Total number of workflow transition attempts",
        &["action", "outcome"]
    )
    .expect("Failed to register TRANSITIONS")
});

/// Counter for cascaded signer terminations by kind.
pub static CASCADES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "signing_cascaded_signers_total",
        "Total number of signers force-terminated by a cascade",
        &["kind"]
    )
    .expect("Failed to register CASCADES")
});

/// Counter for second-factor gate checks by outcome.
pub static SECOND_FACTOR_CHECKS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "signing_second_factor_checks_total",
        "Total number of second-factor gate checks",
        &["outcome"]
    )
    .expect("Failed to register SECOND_FACTOR_CHECKS")
});

/// Counter for dispatched notifications by type and result.
pub static NOTIFICATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "signing_notifications_total",
        "Total number of notification dispatch results",
        &["notification_type", "result"]
    )
    .expect("Failed to register NOTIFICATIONS")
});

/// Counter for reconciliation sweep results.
pub static SWEEP_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "signing_sweep_requests_total",
        "Total number of requests processed by reconciliation sweeps",
        &["sweep", "result"]
    )
    .expect("Failed to register SWEEP_RUNS")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "signing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "signing_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&TRANSITIONS);
    Lazy::force(&CASCADES);
    Lazy::force(&SECOND_FACTOR_CHECKS);
    Lazy::force(&NOTIFICATIONS);
    Lazy::force(&SWEEP_RUNS);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ERRORS);
}

/// Render all metrics in the Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
