//! Shipment status enum and provider code normalisation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a shipment as reported by the tracking provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Label created, carrier has not seen the parcel yet.
    Pending,
    InfoReceived,
    InTransit,
    OutForDelivery,
    /// Delivery was attempted and failed.
    AttemptFail,
    AvailableForPickup,
    /// Carrier reported a problem (customs hold, damage, ...).
    Exception,
    Delivered,
    Returned,
    Cancelled,
    /// Provider reported a code we do not recognise.
    Unknown,
}

impl ShipmentStatus {
    /// Every recognised status, in rough lifecycle order.
    pub const RECOGNIZED: [ShipmentStatus; 10] = [
        ShipmentStatus::Pending,
        ShipmentStatus::InfoReceived,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::AttemptFail,
        ShipmentStatus::AvailableForPickup,
        ShipmentStatus::Exception,
        ShipmentStatus::Delivered,
        ShipmentStatus::Returned,
        ShipmentStatus::Cancelled,
    ];

    /// Statuses after which no further polling happens.
    pub const TERMINAL: [ShipmentStatus; 3] = [
        ShipmentStatus::Delivered,
        ShipmentStatus::Returned,
        ShipmentStatus::Cancelled,
    ];

    /// Map a raw provider code to a status.
    ///
    /// Matching ignores case and the separators `_`, `-` and space, so
    /// `InTransit`, `in_transit` and `IN-TRANSIT` are equivalent. Anything
    /// else becomes [`ShipmentStatus::Unknown`].
    pub fn from_provider_code(code: &str) -> Self {
        let normalized: String = code
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "pending" => ShipmentStatus::Pending,
            "inforeceived" => ShipmentStatus::InfoReceived,
            "intransit" => ShipmentStatus::InTransit,
            "outfordelivery" => ShipmentStatus::OutForDelivery,
            "attemptfail" | "failedattempt" => ShipmentStatus::AttemptFail,
            "availableforpickup" => ShipmentStatus::AvailableForPickup,
            "exception" => ShipmentStatus::Exception,
            "delivered" => ShipmentStatus::Delivered,
            "returned" | "returntosender" => ShipmentStatus::Returned,
            "cancelled" | "canceled" => ShipmentStatus::Cancelled,
            _ => ShipmentStatus::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn is_initial(self) -> bool {
        self == ShipmentStatus::Pending
    }

    pub fn is_recognized(self) -> bool {
        self != ShipmentStatus::Unknown
    }

    /// Stable snake_case identifier used in the database and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::InfoReceived => "info_received",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::AttemptFail => "attempt_fail",
            ShipmentStatus::AvailableForPickup => "available_for_pickup",
            ShipmentStatus::Exception => "exception",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Returned => "returned",
            ShipmentStatus::Cancelled => "cancelled",
            ShipmentStatus::Unknown => "unknown",
        }
    }

    /// Human-readable label for customer-facing text.
    pub fn label(self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "Pending",
            ShipmentStatus::InfoReceived => "Label created",
            ShipmentStatus::InTransit => "In transit",
            ShipmentStatus::OutForDelivery => "Out for delivery",
            ShipmentStatus::AttemptFail => "Delivery attempted",
            ShipmentStatus::AvailableForPickup => "Ready for pickup",
            ShipmentStatus::Exception => "Delivery exception",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Returned => "Returned to sender",
            ShipmentStatus::Cancelled => "Cancelled",
            ShipmentStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_provider_code(s))
    }
}

/// One observation of a shipment's remote state within a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub order_id: String,
    pub status: ShipmentStatus,
    /// Code exactly as the provider sent it.
    pub raw_code: String,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_code_variants() {
        assert_eq!(
            ShipmentStatus::from_provider_code("InTransit"),
            ShipmentStatus::InTransit
        );
        assert_eq!(
            ShipmentStatus::from_provider_code("in_transit"),
            ShipmentStatus::InTransit
        );
        assert_eq!(
            ShipmentStatus::from_provider_code("IN-TRANSIT"),
            ShipmentStatus::InTransit
        );
        assert_eq!(
            ShipmentStatus::from_provider_code("Out For Delivery"),
            ShipmentStatus::OutForDelivery
        );
        assert_eq!(
            ShipmentStatus::from_provider_code("canceled"),
            ShipmentStatus::Cancelled
        );
    }

    #[test]
    fn test_unrecognized_code_maps_to_unknown() {
        assert_eq!(
            ShipmentStatus::from_provider_code("Teleported"),
            ShipmentStatus::Unknown
        );
        assert_eq!(ShipmentStatus::from_provider_code(""), ShipmentStatus::Unknown);
    }

    #[test]
    fn test_as_str_round_trips_through_parser() {
        for status in ShipmentStatus::RECOGNIZED {
            assert_eq!(ShipmentStatus::from_provider_code(status.as_str()), status);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ShipmentStatus::Delivered.is_terminal());
        assert!(ShipmentStatus::Returned.is_terminal());
        assert!(ShipmentStatus::Cancelled.is_terminal());
        assert!(!ShipmentStatus::InTransit.is_terminal());
        assert!(!ShipmentStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&ShipmentStatus::OutForDelivery).unwrap(),
            "\"out_for_delivery\""
        );
        let parsed: ShipmentStatus = serde_json::from_str("\"delivered\"").unwrap();
        assert_eq!(parsed, ShipmentStatus::Delivered);
    }
}
