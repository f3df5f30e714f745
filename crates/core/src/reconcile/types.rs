//! Types for the tracking reconciliation job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notify::EmailError;
use crate::order::StoreError;
use crate::shipment::ShipmentStatus;
use crate::tracking::TrackingError;

/// Per-order failures. These never abort a run; they end up in the summary.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("tracking provider unavailable: {0}")]
    ProviderUnavailable(#[source] TrackingError),

    #[error("unrecognised provider status code: {raw_code}")]
    UnknownStatus { raw_code: String },

    #[error("notification send failed: {0}")]
    NotificationSendFailure(#[source] EmailError),

    /// Someone else changed the order between load and send.
    #[error("order changed concurrently (expected {expected:?}, found {found:?})")]
    PersistenceConflict {
        expected: Option<ShipmentStatus>,
        found: Option<ShipmentStatus>,
    },

    /// The email went out but the status write did not land.
    #[error("status {status} sent but not persisted: {reason}")]
    PersistenceFailureAfterSend {
        status: ShipmentStatus,
        reason: String,
    },

    #[error("order store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum JobError {
    /// The batch could not be loaded.
    #[error("infrastructure failure: {0}")]
    Infrastructure(#[source] StoreError),
}

/// Per-run overrides of the configured job settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub batch_size: Option<usize>,
    pub timeout: Option<Duration>,
    /// Identity that triggered the run, recorded in the audit trail.
    pub triggered_by: Option<String>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn triggered_by(mut self, who: impl Into<String>) -> Self {
        self.triggered_by = Some(who.into());
        self
    }
}

/// How one order's pipeline ended.
#[derive(Debug)]
pub enum OrderOutcome {
    /// Email sent and status persisted.
    Notified {
        previous: Option<ShipmentStatus>,
        current: ShipmentStatus,
    },
    /// Remote status equals the persisted one; nothing written.
    Unchanged,
    /// First observation of the initial status, persisted without an email.
    Recorded { status: ShipmentStatus },
    /// A pending-persist marker was settled without resending.
    Recovered { status: ShipmentStatus },
    /// Nothing to do this run (unknown code, concurrent change, no shipment yet).
    Skipped { reason: SkipReason },
    /// Not started before the run's deadline. No side effects.
    Deferred,
    Failed { error: ReconcileError },
    /// Email sent, status write failed.
    Anomaly {
        error: ReconcileError,
        marker_written: bool,
    },
}

#[derive(Debug)]
pub enum SkipReason {
    NoTrackingCode,
    AlreadySettled,
    NotFoundAtProvider,
    UnknownStatus(ReconcileError),
    Conflict(ReconcileError),
    OrderMissing,
}

impl OrderOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            OrderOutcome::Notified { .. } => "notified",
            OrderOutcome::Unchanged => "unchanged",
            OrderOutcome::Recorded { .. } => "recorded",
            OrderOutcome::Recovered { .. } => "recovered",
            OrderOutcome::Skipped { .. } => "skipped",
            OrderOutcome::Deferred => "deferred",
            OrderOutcome::Failed { .. } => "failed",
            OrderOutcome::Anomaly { .. } => "anomaly",
        }
    }
}

/// Why an order shows up in `RunSummary::issues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Failed,
    Anomaly,
    UnknownStatus,
    Conflict,
}

/// An order that needs attention after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIssue {
    pub order_id: String,
    pub kind: IssueKind,
    pub message: String,
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Orders loaded for this run.
    pub batch_size: usize,
    /// Orders whose pipeline reached an outcome (everything but `deferred`).
    pub processed: usize,
    pub notified: usize,
    pub failed: usize,
    pub anomalies: usize,
    pub unchanged: usize,
    pub recorded: usize,
    pub recovered: usize,
    pub skipped: usize,
    pub deferred: usize,
    /// Highest number of pipelines in flight at once.
    pub peak_concurrency: usize,
    pub issues: Vec<OrderIssue>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>, batch_size: usize) -> Self {
        Self {
            run_id: run_id.into(),
            started_at,
            finished_at: started_at,
            batch_size,
            processed: 0,
            notified: 0,
            failed: 0,
            anomalies: 0,
            unchanged: 0,
            recorded: 0,
            recovered: 0,
            skipped: 0,
            deferred: 0,
            peak_concurrency: 0,
            issues: Vec::new(),
        }
    }

    /// Fold one order's outcome into the counters.
    pub fn record(&mut self, order_id: &str, outcome: &OrderOutcome) {
        if !matches!(outcome, OrderOutcome::Deferred) {
            self.processed += 1;
        }

        let mut issue = |kind: IssueKind, message: String| {
            self.issues.push(OrderIssue {
                order_id: order_id.to_string(),
                kind,
                message,
            })
        };

        match outcome {
            OrderOutcome::Notified { .. } => self.notified += 1,
            OrderOutcome::Unchanged => self.unchanged += 1,
            OrderOutcome::Recorded { .. } => self.recorded += 1,
            OrderOutcome::Recovered { .. } => self.recovered += 1,
            OrderOutcome::Deferred => self.deferred += 1,
            OrderOutcome::Skipped { reason } => {
                match reason {
                    SkipReason::UnknownStatus(e) => issue(IssueKind::UnknownStatus, e.to_string()),
                    SkipReason::Conflict(e) => issue(IssueKind::Conflict, e.to_string()),
                    _ => {}
                }
                self.skipped += 1;
            }
            OrderOutcome::Failed { error } => {
                issue(IssueKind::Failed, error.to_string());
                self.failed += 1;
            }
            OrderOutcome::Anomaly { error, .. } => {
                issue(IssueKind::Anomaly, error.to_string());
                self.anomalies += 1;
            }
        }
    }

    /// Record a pipeline that died without producing an outcome.
    pub fn record_crash(&mut self, order_id: &str, message: String) {
        self.processed += 1;
        self.failed += 1;
        self.issues.push(OrderIssue {
            order_id: order_id.to_string(),
            kind: IssueKind::Failed,
            message,
        });
    }

    pub fn timed_out(&self) -> bool {
        self.deferred > 0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
