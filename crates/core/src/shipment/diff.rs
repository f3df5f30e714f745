//! Status diff engine.

use super::ShipmentStatus;

/// Outcome of comparing a persisted status with a freshly fetched one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDiff {
    /// The shipment moved to a new recognised status; the customer should hear about it.
    Notify {
        previous: Option<ShipmentStatus>,
        current: ShipmentStatus,
    },
    /// Remote status equals the persisted one.
    Unchanged,
    /// First sighting of the order, and it is still in the initial state.
    /// Worth recording, not worth an email.
    InitialObservation,
    /// Provider returned something outside the known vocabulary.
    Unrecognized,
}

impl StatusDiff {
    pub fn should_notify(&self) -> bool {
        matches!(self, StatusDiff::Notify { .. })
    }
}

/// Decide whether a notification-worthy transition happened.
pub fn evaluate(previous: Option<ShipmentStatus>, remote: ShipmentStatus) -> StatusDiff {
    if !remote.is_recognized() {
        return StatusDiff::Unrecognized;
    }

    match previous {
        Some(prev) if prev == remote => StatusDiff::Unchanged,
        None if remote.is_initial() => StatusDiff::InitialObservation,
        _ => StatusDiff::Notify {
            previous,
            current: remote,
        },
    }
}
