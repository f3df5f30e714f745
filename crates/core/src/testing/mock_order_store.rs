//! In-memory order store for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::order::{
    CreateOrderRequest, Order, OrderQuery, OrderStore, StatusUpdate, StoreError, UpdateOutcome,
};
use crate::shipment::ShipmentStatus;

#[derive(Default)]
struct Inner {
    orders: HashMap<String, Order>,
    /// Insertion order, used as the `created_at` tiebreak.
    sequence: Vec<String>,
}

/// In-memory implementation of `OrderStore` with failure injection.
///
/// Mirrors the compare-and-set semantics of the SQLite store so the
/// reconciliation job can be exercised without a database.
///
/// # Example
///
/// ```rust,ignore
/// use shiptrack_core::testing::{fixtures, MockOrderStore};
///
/// let store = MockOrderStore::new();
/// store.insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
///
/// // Make every status write fail from now on
/// store.fail_updates(true);
/// ```
#[derive(Default)]
pub struct MockOrderStore {
    inner: Mutex<Inner>,
    fail_queries: AtomicBool,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
    fail_marks: AtomicBool,
    update_calls: AtomicUsize,
    successful_updates: AtomicUsize,
    recorded_checks: AtomicUsize,
}

impl std::fmt::Debug for MockOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockOrderStore")
            .field("update_calls", &self.update_calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MockOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("mock store lock poisoned".to_string()))
    }

    /// Seed an order as-is.
    pub fn insert(&self, order: Order) {
        if let Ok(mut inner) = self.lock() {
            if !inner.orders.contains_key(&order.id) {
                inner.sequence.push(order.id.clone());
            }
            inner.orders.insert(order.id.clone(), order);
        }
    }

    /// Overwrite the persisted status directly (simulates a concurrent writer).
    pub fn set_status(&self, order_id: &str, status: Option<ShipmentStatus>) {
        if let Ok(mut inner) = self.lock() {
            if let Some(order) = inner.orders.get_mut(order_id) {
                order.last_known_status = status;
                order.updated_at = Utc::now();
            }
        }
    }

    /// Make the batch query fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make `get` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `update_order_status` fail.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make `mark_pending_persist` fail.
    pub fn fail_marks(&self, fail: bool) {
        self.fail_marks.store(fail, Ordering::SeqCst);
    }

    /// Every `update_order_status` call, including failed and conflicting ones.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Status writes that actually changed a row.
    pub fn successful_updates(&self) -> usize {
        self.successful_updates.load(Ordering::SeqCst)
    }

    /// `record_check` calls that stamped an order.
    pub fn recorded_checks(&self) -> usize {
        self.recorded_checks.load(Ordering::SeqCst)
    }

    /// Snapshot of one order.
    pub fn order(&self, id: &str) -> Option<Order> {
        self.lock().ok().and_then(|inner| inner.orders.get(id).cloned())
    }
}

impl OrderStore for MockOrderStore {
    fn create(&self, request: CreateOrderRequest) -> Result<Order, StoreError> {
        let now = Utc::now();
        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            tracking_code: request.tracking_code,
            customer_email: request.customer_email,
            last_known_status: None,
            last_notified_status: None,
            last_checked_at: None,
            last_notified_at: None,
            pending_persist_status: None,
            pending_persist_at: None,
            created_at: now,
            updated_at: now,
        };
        self.insert(order.clone());
        Ok(order)
    }

    fn get(&self, id: &str) -> Result<Option<Order>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected read failure".to_string()));
        }
        Ok(self.lock()?.orders.get(id).cloned())
    }

    fn get_orders_needing_tracking_check(
        &self,
        query: &OrderQuery,
    ) -> Result<Vec<Order>, StoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected query failure".to_string()));
        }

        let inner = self.lock()?;
        let cutoff = query.cutoff(Utc::now());

        let mut matching: Vec<(usize, &Order)> = inner
            .sequence
            .iter()
            .enumerate()
            .filter_map(|(seq, id)| inner.orders.get(id).map(|o| (seq, o)))
            .filter(|(_, o)| o.tracking_code.as_deref().is_some_and(|c| !c.is_empty()))
            .filter(|(_, o)| o.updated_at >= cutoff)
            .filter(|(_, o)| {
                o.last_known_status
                    .map_or(true, |s| !query.exclude_statuses.contains(&s))
            })
            .collect();

        // Never-checked first, then least recently checked, then oldest.
        matching.sort_by_key(|(seq, o)| (o.last_checked_at.is_some(), o.last_checked_at, *seq));

        Ok(matching
            .into_iter()
            .take(query.limit)
            .map(|(_, o)| o.clone())
            .collect())
    }

    fn update_order_status(&self, update: &StatusUpdate) -> Result<UpdateOutcome, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected write failure".to_string()));
        }

        let mut inner = self.lock()?;
        let order = inner
            .orders
            .get_mut(&update.order_id)
            .ok_or_else(|| StoreError::NotFound(update.order_id.clone()))?;

        if order.last_known_status != update.expected_previous {
            return Ok(UpdateOutcome::Conflict);
        }

        order.last_known_status = Some(update.new_status);
        order.last_checked_at = Some(update.checked_at);
        order.updated_at = update.checked_at;
        if let Some(notified_at) = update.notified_at {
            order.last_notified_status = Some(update.new_status);
            order.last_notified_at = Some(notified_at);
        }
        order.pending_persist_status = None;
        order.pending_persist_at = None;

        self.successful_updates.fetch_add(1, Ordering::SeqCst);
        Ok(UpdateOutcome::Updated)
    }

    fn record_check(&self, order_id: &str, checked_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;
        order.last_checked_at = Some(checked_at);
        self.recorded_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn mark_pending_persist(
        &self,
        order_id: &str,
        status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected marker failure".to_string()));
        }

        let mut inner = self.lock()?;
        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;
        order.pending_persist_status = Some(status);
        order.pending_persist_at = Some(at);
        Ok(())
    }

    fn list_pending_anomalies(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let inner = self.lock()?;
        let mut marked: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.pending_persist_status.is_some())
            .cloned()
            .collect();
        marked.sort_by_key(|o| o.pending_persist_at);
        marked.truncate(limit);
        Ok(marked)
    }

    fn count_pending_anomalies(&self) -> Result<usize, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .orders
            .values()
            .filter(|o| o.pending_persist_status.is_some())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_compare_and_set() {
        let store = MockOrderStore::new();
        store.insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));

        let mut update = fixtures::status_update("o1", Some(ShipmentStatus::Pending), ShipmentStatus::Delivered);
        assert_eq!(
            store.update_order_status(&update).unwrap(),
            UpdateOutcome::Conflict
        );

        update.expected_previous = Some(ShipmentStatus::InTransit);
        assert_eq!(
            store.update_order_status(&update).unwrap(),
            UpdateOutcome::Updated
        );
        assert_eq!(
            store.order("o1").unwrap().last_known_status,
            Some(ShipmentStatus::Delivered)
        );
        assert_eq!(store.update_calls(), 2);
        assert_eq!(store.successful_updates(), 1);
    }

    #[test]
    fn test_batch_excludes_terminal_and_untracked() {
        let store = MockOrderStore::new();
        store.insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
        store.insert(fixtures::order("o2", "TRK2", Some(ShipmentStatus::Delivered)));
        store.insert(fixtures::order("o3", "", None));

        let batch = store
            .get_orders_needing_tracking_check(&OrderQuery::active(chrono::Duration::hours(72), 10))
            .unwrap();
        let ids: Vec<_> = batch.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o1"]);
    }

    #[test]
    fn test_failure_injection() {
        let store = MockOrderStore::new();
        store.insert(fixtures::order("o1", "TRK1", None));

        store.fail_updates(true);
        let update = fixtures::status_update("o1", None, ShipmentStatus::InTransit);
        assert!(store.update_order_status(&update).is_err());

        store.fail_marks(true);
        assert!(store
            .mark_pending_persist("o1", ShipmentStatus::InTransit, Utc::now())
            .is_err());

        store.fail_marks(false);
        store
            .mark_pending_persist("o1", ShipmentStatus::InTransit, Utc::now())
            .unwrap();
        assert_eq!(store.list_pending_anomalies(10).unwrap().len(), 1);
        assert_eq!(store.count_pending_anomalies().unwrap(), 1);
    }

    #[test]
    fn test_recorded_check_moves_order_to_back() {
        let store = MockOrderStore::new();
        store.insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
        store.insert(fixtures::order("o2", "TRK2", Some(ShipmentStatus::InTransit)));
        let query = OrderQuery::active(chrono::Duration::hours(72), 1);

        let first = store.get_orders_needing_tracking_check(&query).unwrap();
        assert_eq!(first[0].id, "o1");
        store.record_check("o1", Utc::now()).unwrap();

        let second = store.get_orders_needing_tracking_check(&query).unwrap();
        assert_eq!(second[0].id, "o2");
        assert_eq!(store.recorded_checks(), 1);
        assert_eq!(store.update_calls(), 0);
    }
}
