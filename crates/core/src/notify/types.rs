//! Types for outbound customer notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shipment::ShipmentStatus;

/// A "your shipment moved" email for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingUpdateEmail {
    pub to: String,
    pub order_id: String,
    pub status: ShipmentStatus,
    pub tracking_code: String,
}

/// Errors that can occur when sending an email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// The recipient address was refused by the API.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Email API rate limited")]
    RateLimited,

    #[error("Email API connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Email API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for email delivery backends.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Backend name for logging/audit.
    fn name(&self) -> &str;

    /// Send one tracking update. `Ok` means the provider accepted the message.
    async fn send_tracking_update(&self, email: &TrackingUpdateEmail) -> Result<(), EmailError>;
}
