//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Reconciliation runs (outcomes, duration, in-flight pipelines)
//! - Notifications (sent, failed, anomalies)
//! - External services (tracking provider, email API)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Reconciliation Run Metrics
// =============================================================================

/// Reconciliation runs by result.
pub static JOB_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("shiptrack_job_runs_total", "Total reconciliation runs"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Reconciliation run duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "shiptrack_job_duration_seconds",
            "Duration of reconciliation runs",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"],
    )
    .unwrap()
});

/// Orders handled by per-order outcome.
pub static ORDERS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "shiptrack_orders_processed_total",
            "Orders handled by the reconciliation job",
        ),
        // "notified", "unchanged", "recorded", "skipped", "failed", "anomaly", "recovered", "deferred"
        &["outcome"],
    )
    .unwrap()
});

/// Per-order pipelines currently holding a slot.
pub static PIPELINES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "shiptrack_pipelines_in_flight",
        "Per-order pipelines currently running",
    )
    .unwrap()
});

// =============================================================================
// Notification Metrics
// =============================================================================

/// Notification emails sent, by shipment status.
pub static NOTIFICATIONS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "shiptrack_notifications_sent_total",
            "Tracking update emails sent",
        ),
        &["status"],
    )
    .unwrap()
});

/// Notification sends that failed.
pub static NOTIFICATIONS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "shiptrack_notifications_failed_total",
        "Tracking update emails that failed to send",
    )
    .unwrap()
});

/// Sends whose status write failed afterwards.
pub static RECONCILIATION_ANOMALIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "shiptrack_reconciliation_anomalies_total",
        "Emails sent whose status could not be persisted",
    )
    .unwrap()
});

/// Unrecognised provider codes seen.
pub static UNKNOWN_STATUSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "shiptrack_unknown_statuses_total",
        "Provider status codes that did not map to a known status",
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "shiptrack_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "shiptrack_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "not_found", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Runs
        Box::new(JOB_RUNS.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(ORDERS_PROCESSED.clone()),
        Box::new(PIPELINES_IN_FLIGHT.clone()),
        // Notifications
        Box::new(NOTIFICATIONS_SENT.clone()),
        Box::new(NOTIFICATIONS_FAILED.clone()),
        Box::new(RECONCILIATION_ANOMALIES.clone()),
        Box::new(UNKNOWN_STATUSES.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
