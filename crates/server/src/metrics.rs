//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the shiptrack server:
//! - HTTP request metrics (latency, counts, auth failures)
//! - Orders waiting on manual reconciliation (collected on scrape)
//! - Everything the core crate records for reconciliation runs

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::state::AppState;

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
            "shiptrack_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("shiptrack_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "shiptrack_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "shiptrack_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Reconciliation State
// =============================================================================

/// Orders whose email went out but whose status write never landed.
pub static PENDING_ANOMALIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "shiptrack_pending_anomalies",
        "Orders carrying a pending-persist marker",
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
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Reconciliation
    registry
        .register(Box::new(PENDING_ANOMALIES.clone()))
        .unwrap();

    // Core metrics (job runs, notifications, external services)
    for metric in shiptrack_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges that are derived from the database.
pub fn collect_dynamic_metrics(state: &AppState) {
    match state.order_store().count_pending_anomalies() {
        Ok(count) => PENDING_ANOMALIES.set(count as i64),
        Err(e) => tracing::warn!(error = %e, "Failed to count pending anomalies"),
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/orders/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/orders/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/orders/12345/anomaly";
        assert_eq!(normalize_path(path), "/api/v1/orders/{id}/anomaly");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/jobs/tracking-notifications";
        assert_eq!(normalize_path(path), "/api/v1/jobs/tracking-notifications");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("shiptrack_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        PENDING_ANOMALIES.set(0);
        shiptrack_core::metrics::RECONCILIATION_ANOMALIES.inc_by(0);
        shiptrack_core::metrics::JOB_RUNS
            .with_label_values(&["completed"])
            .inc_by(0);

        let output = encode_metrics();

        assert!(output.contains("shiptrack_http_request_duration_seconds"));
        assert!(output.contains("shiptrack_pending_anomalies"));
        assert!(output.contains("shiptrack_reconciliation_anomalies_total"));
        assert!(output.contains("shiptrack_job_runs_total"));
    }
}
