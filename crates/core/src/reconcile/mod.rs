//! Tracking-notification reconciliation.
//!
//! Stateless between invocations: an external scheduler calls
//! [`TrackingReconciliationJob::run`] once per tick.

mod job;
mod limiter;
mod types;

pub use job::{TrackingReconciliationJob, MAX_RUN_TIMEOUT};
pub use limiter::{SlotLimiter, SlotPermit, SlotStatus};
pub use types::{
    IssueKind, JobError, OrderIssue, OrderOutcome, ReconcileError, RunOptions, RunSummary,
    SkipReason,
};
