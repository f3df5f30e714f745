//! Order storage trait and request types.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::shipment::ShipmentStatus;

use super::Order;

/// Error type for order storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Selection criteria for the orders a run should check.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    /// Only orders whose `updated_at` falls within this window are considered.
    ///
    /// `updated_at` moves on status writes only, so a shipment that sits in
    /// one non-terminal status for longer than the window stops being polled.
    pub max_age: Duration,
    /// Orders whose last known status is in this list are skipped.
    pub exclude_statuses: Vec<ShipmentStatus>,
    /// Maximum number of orders returned.
    pub limit: usize,
}

impl OrderQuery {
    /// Orders updated in the last `max_age` that have not reached a terminal status.
    pub fn active(max_age: Duration, limit: usize) -> Self {
        Self {
            max_age,
            exclude_statuses: ShipmentStatus::TERMINAL.to_vec(),
            limit,
        }
    }

    /// Oldest `updated_at` still inside the window.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.max_age
    }
}

/// A compare-and-set status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub order_id: String,
    /// The status the caller believes is currently persisted.
    pub expected_previous: Option<ShipmentStatus>,
    pub new_status: ShipmentStatus,
    /// Set when the write follows a confirmed notification.
    pub notified_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

/// Result of a compare-and-set status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// The persisted status no longer matched `expected_previous`.
    Conflict,
}

/// Request to create a new order (upstream order-placement flow).
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer_email: String,
    pub tracking_code: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(customer_email: impl Into<String>) -> Self {
        Self {
            customer_email: customer_email.into(),
            tracking_code: None,
        }
    }

    pub fn with_tracking_code(mut self, code: impl Into<String>) -> Self {
        self.tracking_code = Some(code.into());
        self
    }
}

/// Trait for order storage backends.
pub trait OrderStore: Send + Sync {
    /// Create a new order with no shipment status yet.
    fn create(&self, request: CreateOrderRequest) -> Result<Order, StoreError>;

    /// Get an order by ID.
    fn get(&self, id: &str) -> Result<Option<Order>, StoreError>;

    /// Orders with a tracking code that still need polling, least recently checked first.
    fn get_orders_needing_tracking_check(
        &self,
        query: &OrderQuery,
    ) -> Result<Vec<Order>, StoreError>;

    /// Persist a new status if the stored one still equals `expected_previous`.
    ///
    /// A successful write also clears any pending-persist marker.
    fn update_order_status(&self, update: &StatusUpdate) -> Result<UpdateOutcome, StoreError>;

    /// Stamp `last_checked_at` after a check that wrote no status.
    ///
    /// Rotates the batch so unchanged orders do not crowd out the rest.
    /// Status, notification and `updated_at` fields are left alone.
    fn record_check(&self, order_id: &str, checked_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Record that `status` was emailed but could not be persisted.
    fn mark_pending_persist(
        &self,
        order_id: &str,
        status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Orders carrying a pending-persist marker, oldest first.
    fn list_pending_anomalies(&self, limit: usize) -> Result<Vec<Order>, StoreError>;

    /// Number of orders carrying a pending-persist marker.
    fn count_pending_anomalies(&self) -> Result<usize, StoreError>;
}
