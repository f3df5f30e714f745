use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Reconciliation runs
    JobStarted {
        run_id: String,
        /// Who triggered the run ("api_key_user", "anonymous", ...)
        triggered_by: String,
        batch_size: usize,
        max_concurrency: usize,
    },
    JobCompleted {
        run_id: String,
        processed: usize,
        notified: usize,
        failed: usize,
        anomalies: usize,
        deferred: usize,
        duration_ms: u64,
    },
    /// The run could not start (batch query failed).
    JobFailed {
        run_id: String,
        error: String,
    },

    // Per-order events
    NotificationSent {
        run_id: String,
        order_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_status: Option<String>,
        new_status: String,
    },
    NotificationFailed {
        run_id: String,
        order_id: String,
        status: String,
        error: String,
    },
    /// Provider returned a code that maps to no known status.
    UnknownStatus {
        run_id: String,
        order_id: String,
        raw_code: String,
    },
    /// An email went out but the status could not be written.
    ReconciliationAnomaly {
        run_id: String,
        order_id: String,
        status: String,
        error: String,
        /// Whether the pending-persist marker was written.
        marker_written: bool,
    },
    /// A marked order was repaired without resending.
    AnomalyRecovered {
        run_id: String,
        order_id: String,
        status: String,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::JobStarted { .. } => "job_started",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::NotificationSent { .. } => "notification_sent",
            Self::NotificationFailed { .. } => "notification_failed",
            Self::UnknownStatus { .. } => "unknown_status",
            Self::ReconciliationAnomaly { .. } => "reconciliation_anomaly",
            Self::AnomalyRecovered { .. } => "anomaly_recovered",
        }
    }

    /// Extract order_id if this event concerns a single order
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::NotificationSent { order_id, .. }
            | Self::NotificationFailed { order_id, .. }
            | Self::UnknownStatus { order_id, .. }
            | Self::ReconciliationAnomaly { order_id, .. }
            | Self::AnomalyRecovered { order_id, .. } => Some(order_id),
            _ => None,
        }
    }

    /// Shipment status the event is about, for per-order events that carry one
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::NotificationSent { new_status, .. } => Some(new_status),
            Self::NotificationFailed { status, .. }
            | Self::ReconciliationAnomaly { status, .. }
            | Self::AnomalyRecovered { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Extract run_id if this event belongs to a reconciliation run
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
            Self::JobStarted { run_id, .. }
            | Self::JobCompleted { run_id, .. }
            | Self::JobFailed { run_id, .. }
            | Self::NotificationSent { run_id, .. }
            | Self::NotificationFailed { run_id, .. }
            | Self::UnknownStatus { run_id, .. }
            | Self::ReconciliationAnomaly { run_id, .. }
            | Self::AnomalyRecovered { run_id, .. } => Some(run_id),
        }
    }
}

/// A stored audit record with its indexed columns pulled out of the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub order_id: Option<String>,
    pub run_id: Option<String>,
    pub status: Option<String>,
    pub data: AuditEvent,
}

impl AuditRecord {
    /// Unsaved record (id 0) for an event emitted at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>, event: AuditEvent) -> Self {
        Self {
            id: 0,
            timestamp,
            event_type: event.event_type().to_string(),
            order_id: event.order_id().map(String::from),
            run_id: event.run_id().map(String::from),
            status: event.status().map(String::from),
            data: event,
        }
    }
}
