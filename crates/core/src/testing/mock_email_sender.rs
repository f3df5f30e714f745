//! Mock email sender for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::notify::{EmailError, EmailSender, TrackingUpdateEmail};

/// Mock implementation of the EmailSender trait.
///
/// Records every successful send and can be told to fail for specific
/// orders or for everything.
///
/// # Example
///
/// ```rust,ignore
/// use shiptrack_core::testing::MockEmailSender;
///
/// let email = MockEmailSender::new();
/// email.fail_for_order("o2").await;
///
/// // ... run the job ...
///
/// assert_eq!(email.sent_to_order("o1").await.len(), 1);
/// assert!(email.sent_to_order("o2").await.is_empty());
/// ```
pub struct MockEmailSender {
    sent: Arc<RwLock<Vec<TrackingUpdateEmail>>>,
    failing_orders: Arc<RwLock<HashSet<String>>>,
    fail_all: Arc<RwLock<bool>>,
    latency: Arc<RwLock<Duration>>,
    attempts: Arc<RwLock<usize>>,
}

impl std::fmt::Debug for MockEmailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEmailSender")
            .field("sent", &"<sent>")
            .field("failing_orders", &"<failing_orders>")
            .finish()
    }
}

impl Default for MockEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            failing_orders: Arc::new(RwLock::new(HashSet::new())),
            fail_all: Arc::new(RwLock::new(false)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            attempts: Arc::new(RwLock::new(0)),
        }
    }

    /// Fail every send for this order.
    pub async fn fail_for_order(&self, order_id: &str) {
        self.failing_orders
            .write()
            .await
            .insert(order_id.to_string());
    }

    /// Fail every send.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Successfully sent emails, in send order.
    pub async fn sent(&self) -> Vec<TrackingUpdateEmail> {
        self.sent.read().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }

    pub async fn sent_to_order(&self, order_id: &str) -> Vec<TrackingUpdateEmail> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Sends attempted, including failed ones.
    pub async fn attempts(&self) -> usize {
        *self.attempts.read().await
    }

    pub async fn clear(&self) {
        self.sent.write().await.clear();
        self.failing_orders.write().await.clear();
        *self.fail_all.write().await = false;
        *self.attempts.write().await = 0;
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_tracking_update(&self, email: &TrackingUpdateEmail) -> Result<(), EmailError> {
        *self.attempts.write().await += 1;

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if *self.fail_all.read().await || self.failing_orders.read().await.contains(&email.order_id)
        {
            return Err(EmailError::ConnectionFailed(
                "mock email provider unavailable".to_string(),
            ));
        }

        self.sent.write().await.push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shipment::ShipmentStatus;

    fn email(order_id: &str) -> TrackingUpdateEmail {
        TrackingUpdateEmail {
            to: "buyer@example.com".to_string(),
            order_id: order_id.to_string(),
            status: ShipmentStatus::Delivered,
            tracking_code: "TRK1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_sends() {
        let sender = MockEmailSender::new();
        sender.send_tracking_update(&email("o1")).await.unwrap();
        assert_eq!(sender.sent_count().await, 1);
        assert_eq!(sender.sent_to_order("o1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_for_order() {
        let sender = MockEmailSender::new();
        sender.fail_for_order("o2").await;

        assert!(sender.send_tracking_update(&email("o1")).await.is_ok());
        assert!(sender.send_tracking_update(&email("o2")).await.is_err());
        assert_eq!(sender.sent_count().await, 1);
        assert_eq!(sender.attempts().await, 2);
    }
}
