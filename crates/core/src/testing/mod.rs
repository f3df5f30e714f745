//! Testing utilities and mock implementations.
//!
//! Mocks for every seam the reconciliation job talks through, so runs can be
//! exercised end to end without a database, a carrier API or a mail provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use shiptrack_core::testing::{fixtures, MockEmailSender, MockOrderStore, MockTrackingProvider};
//!
//! let store = Arc::new(MockOrderStore::new());
//! let provider = Arc::new(MockTrackingProvider::new());
//! let email = Arc::new(MockEmailSender::new());
//!
//! store.insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
//! provider.set_code("TRK1", "Delivered").await;
//!
//! let job = TrackingReconciliationJob::new(store, provider, email, fixtures::job_config(5));
//! ```

mod mock_email_sender;
mod mock_order_store;
mod mock_tracking_provider;
#[cfg(test)]
pub(crate) mod stub_server;

pub use mock_email_sender::MockEmailSender;
pub use mock_order_store::MockOrderStore;
pub use mock_tracking_provider::{MockTrackingProvider, MockTrackingResponse};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::config::JobConfig;
    use crate::order::{Order, StatusUpdate};
    use crate::shipment::ShipmentStatus;

    /// An order updated just now. An empty `tracking_code` means none assigned.
    pub fn order(id: &str, tracking_code: &str, status: Option<ShipmentStatus>) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            tracking_code: (!tracking_code.is_empty()).then(|| tracking_code.to_string()),
            customer_email: format!("{}@example.com", id),
            last_known_status: status,
            last_notified_status: status,
            last_checked_at: None,
            last_notified_at: None,
            pending_persist_status: None,
            pending_persist_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A compare-and-set write stamped now, without a notification.
    pub fn status_update(
        order_id: &str,
        expected_previous: Option<ShipmentStatus>,
        new_status: ShipmentStatus,
    ) -> StatusUpdate {
        StatusUpdate {
            order_id: order_id.to_string(),
            expected_previous,
            new_status,
            notified_at: None,
            checked_at: Utc::now(),
        }
    }

    /// Job settings with a generous deadline.
    pub fn job_config(max_concurrency: usize) -> JobConfig {
        JobConfig {
            batch_size: 50,
            max_concurrency,
            max_age_hours: 72,
            timeout_secs: 30,
        }
    }
}
