//! Shipment status vocabulary and the status diff engine.
//!
//! The diff engine is a pure function: it never performs I/O and never logs.
//! Callers decide what to do with an [`StatusDiff::Unrecognized`] result.

mod diff;
mod status;

pub use diff::{evaluate, StatusDiff};
pub use status::{ShipmentStatus, StatusSnapshot};
