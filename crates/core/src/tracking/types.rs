//! Types for the tracking provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shipment::ShipmentStatus;

/// Current state of a shipment as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub status: ShipmentStatus,
    /// Provider's own code, kept for logging unrecognised values.
    pub raw_code: String,
    pub observed_at: DateTime<Utc>,
}

impl RemoteStatus {
    /// Build from a raw provider code, observed now.
    pub fn from_code(raw_code: impl Into<String>) -> Self {
        let raw_code = raw_code.into();
        Self {
            status: ShipmentStatus::from_provider_code(&raw_code),
            raw_code,
            observed_at: Utc::now(),
        }
    }
}

/// Errors that can occur during tracking lookups.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// The provider has no shipment for this tracking code (yet).
    #[error("Tracking code not found: {0}")]
    NotFound(String),

    #[error("Tracking provider rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Tracking provider connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Tracking provider API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for shipment tracking backends.
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    /// Provider name for logging/audit.
    fn name(&self) -> &str;

    /// Look up the current status of a shipment.
    async fn get_shipment_status(&self, tracking_code: &str)
        -> Result<RemoteStatus, TrackingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_from_code() {
        let remote = RemoteStatus::from_code("OutForDelivery");
        assert_eq!(remote.status, ShipmentStatus::OutForDelivery);
        assert_eq!(remote.raw_code, "OutForDelivery");

        let remote = RemoteStatus::from_code("Lost_In_Space");
        assert_eq!(remote.status, ShipmentStatus::Unknown);
        assert_eq!(remote.raw_code, "Lost_In_Space");
    }

    #[test]
    fn test_error_display() {
        let err = TrackingError::RateLimited {
            retry_after_ms: 1500,
        };
        assert_eq!(
            err.to_string(),
            "Tracking provider rate limited, retry in 1500ms"
        );
        assert_eq!(TrackingError::Timeout.to_string(), "Request timeout");
    }
}
