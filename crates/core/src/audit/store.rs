//! Audit persistence and the views operators query.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::shipment::ShipmentStatus;

use super::AuditRecord;

/// Event types that make up the anomaly view.
pub const ANOMALY_EVENT_TYPES: [&str; 2] = ["reconciliation_anomaly", "anomaly_recovered"];

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Which audit rows a query selects. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub order_id: Option<String>,
    pub run_id: Option<String>,
    /// Matches any of these types; empty matches all.
    pub event_types: Vec<String>,
    /// Shipment status the event is about.
    pub status: Option<ShipmentStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// Everything one reconciliation run recorded.
    pub fn for_run(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            ..Default::default()
        }
    }

    /// The notification history of one order.
    pub fn for_order(order_id: impl Into<String>) -> Self {
        Self {
            order_id: Some(order_id.into()),
            ..Default::default()
        }
    }

    /// Sends whose status write failed, and their later repairs.
    pub fn anomalies() -> Self {
        Self {
            event_types: ANOMALY_EVENT_TYPES.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn of_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: vec![event_type.into()],
            ..Default::default()
        }
    }
}

/// Result window. Newest first unless `oldest_first` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditPage {
    pub limit: i64,
    pub offset: i64,
    pub oldest_first: bool,
}

impl Default for AuditPage {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            oldest_first: false,
        }
    }
}

/// Trait for audit event storage
pub trait AuditStore: Send + Sync {
    /// Insert an audit record, returns the assigned ID
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    fn query(&self, filter: &AuditFilter, page: AuditPage) -> Result<Vec<AuditRecord>, AuditError>;

    /// Count matching audit records, ignoring paging
    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;
}
