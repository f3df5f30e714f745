//! Semaphore-backed cap on in-flight per-order pipelines.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::metrics::PIPELINES_IN_FLIGHT;

#[derive(Debug, Default)]
struct SlotStats {
    active: AtomicUsize,
    waiting: AtomicUsize,
    peak: AtomicUsize,
    total_acquired: AtomicU64,
}

/// Snapshot of limiter usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub max_slots: usize,
    pub active: usize,
    pub waiting: usize,
    /// Highest `active` value observed.
    pub peak: usize,
    pub total_acquired: u64,
}

/// Caps how many pipelines run at once. Callers beyond the cap wait in FIFO order.
#[derive(Debug, Clone)]
pub struct SlotLimiter {
    semaphore: Arc<Semaphore>,
    max_slots: usize,
    stats: Arc<SlotStats>,
}

/// Held for the lifetime of one pipeline; frees the slot on drop.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
    stats: Arc<SlotStats>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
        PIPELINES_IN_FLIGHT.dec();
    }
}

impl SlotLimiter {
    /// A limiter with `max_slots` slots (at least one).
    pub fn new(max_slots: usize) -> Self {
        let max_slots = max_slots.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_slots)),
            max_slots,
            stats: Arc::new(SlotStats::default()),
        }
    }

    /// Wait for a free slot until `deadline`. Returns `None` if the deadline passes first.
    pub async fn acquire_until(&self, deadline: Instant) -> Option<SlotPermit> {
        self.stats.waiting.fetch_add(1, Ordering::Relaxed);
        let result =
            tokio::time::timeout_at(deadline, Arc::clone(&self.semaphore).acquire_owned()).await;
        self.stats.waiting.fetch_sub(1, Ordering::Relaxed);
        match result {
            Ok(Ok(permit)) => Some(self.admit(permit)),
            _ => None,
        }
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> SlotPermit {
        let active = self.stats.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.peak.fetch_max(active, Ordering::Relaxed);
        self.stats.total_acquired.fetch_add(1, Ordering::Relaxed);
        PIPELINES_IN_FLIGHT.inc();
        SlotPermit {
            _permit: permit,
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn status(&self) -> SlotStatus {
        SlotStatus {
            max_slots: self.max_slots,
            active: self.stats.active.load(Ordering::Relaxed),
            waiting: self.stats.waiting.load(Ordering::Relaxed),
            peak: self.stats.peak.load(Ordering::Relaxed),
            total_acquired: self.stats.total_acquired.load(Ordering::Relaxed),
        }
    }
}
