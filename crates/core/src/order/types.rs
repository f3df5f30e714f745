//! Order record as seen by the reconciliation job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shipment::ShipmentStatus;

/// A customer order with an (optional) shipment attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Assigned by the order-placement flow once the parcel ships.
    pub tracking_code: Option<String>,
    pub customer_email: String,
    /// Last status successfully persisted by the job.
    pub last_known_status: Option<ShipmentStatus>,
    /// Status the customer was last emailed about.
    pub last_notified_status: Option<ShipmentStatus>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Set when an email went out but the status write failed.
    /// While set, the job will not email this order about the same status again.
    pub pending_persist_status: Option<ShipmentStatus>,
    pub pending_persist_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether polling should stop for this order.
    pub fn is_settled(&self) -> bool {
        self.last_known_status
            .map(ShipmentStatus::is_terminal)
            .unwrap_or(false)
    }

    pub fn has_pending_anomaly(&self) -> bool {
        self.pending_persist_status.is_some()
    }
}
