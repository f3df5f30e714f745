//! Tracking reconciliation job.
//!
//! One call to [`TrackingReconciliationJob::run`] loads a bounded batch of
//! orders with active shipments and runs an independent pipeline per order:
//!
//! 1. wait for a slot (bounded by `max_concurrency` and the run deadline)
//! 2. fetch the remote status
//! 3. diff it against the persisted status
//! 4. on a notify-worthy change: re-read the order, send the email, then
//!    compare-and-set the new status
//!
//! Pipelines run as separate tasks so a failure or panic in one never
//! affects the others. Nothing survives between runs except the store.

use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::JobConfig;
use crate::metrics::{
    JOB_DURATION, JOB_RUNS, NOTIFICATIONS_FAILED, NOTIFICATIONS_SENT, ORDERS_PROCESSED,
    RECONCILIATION_ANOMALIES, UNKNOWN_STATUSES,
};
use crate::notify::{EmailSender, TrackingUpdateEmail};
use crate::order::{Order, OrderQuery, OrderStore, StatusUpdate, UpdateOutcome};
use crate::shipment::{evaluate, ShipmentStatus, StatusDiff, StatusSnapshot};
use crate::tracking::{TrackingError, TrackingProvider};

use super::limiter::SlotLimiter;
use super::types::{JobError, OrderOutcome, ReconcileError, RunOptions, RunSummary, SkipReason};

/// Longest a single run may be given, whatever the caller asks for.
pub const MAX_RUN_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

fn run_deadline(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_RUN_TIMEOUT)).unwrap_or(now)
}

/// Shared state for the pipelines of one run.
struct PipelineContext {
    run_id: String,
    store: Arc<dyn OrderStore>,
    provider: Arc<dyn TrackingProvider>,
    email: Arc<dyn EmailSender>,
    audit: Option<AuditHandle>,
    limiter: SlotLimiter,
    deadline: Instant,
}

impl PipelineContext {
    async fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.emit(event).await;
        }
    }
}

/// Polls the tracking provider for active orders and notifies customers of changes.
pub struct TrackingReconciliationJob {
    store: Arc<dyn OrderStore>,
    provider: Arc<dyn TrackingProvider>,
    email: Arc<dyn EmailSender>,
    config: JobConfig,
    audit: Option<AuditHandle>,
}

impl TrackingReconciliationJob {
    pub fn new(
        store: Arc<dyn OrderStore>,
        provider: Arc<dyn TrackingProvider>,
        email: Arc<dyn EmailSender>,
        config: JobConfig,
    ) -> Self {
        Self {
            store,
            provider,
            email,
            config,
            audit: None,
        }
    }

    /// Sets the audit handle for logging events.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run one reconciliation pass.
    ///
    /// Only a failure to load the batch is an error; everything that goes
    /// wrong for an individual order is reported in the summary.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary, JobError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = StdInstant::now();

        let batch_size = options.batch_size.unwrap_or(self.config.batch_size).max(1);
        let timeout = options
            .timeout
            .unwrap_or_else(|| Duration::from_secs(self.config.timeout_secs));
        let deadline = run_deadline(timeout);
        let triggered_by = options
            .triggered_by
            .unwrap_or_else(|| "scheduler".to_string());

        let query = OrderQuery::active(
            chrono::Duration::hours(i64::from(self.config.max_age_hours)),
            batch_size,
        );

        let orders = match self.store.get_orders_needing_tracking_check(&query) {
            Ok(orders) => orders,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Failed to load orders for tracking check");
                JOB_RUNS.with_label_values(&["failed"]).inc();
                JOB_DURATION
                    .with_label_values(&["failed"])
                    .observe(clock.elapsed().as_secs_f64());
                if let Some(ref audit) = self.audit {
                    audit
                        .emit(AuditEvent::JobFailed {
                            run_id: run_id.clone(),
                            error: e.to_string(),
                        })
                        .await;
                }
                return Err(JobError::Infrastructure(e));
            }
        };

        info!(
            run_id = %run_id,
            orders = orders.len(),
            max_concurrency = self.config.max_concurrency,
            timeout_ms = timeout.as_millis() as u64,
            triggered_by = %triggered_by,
            "Starting tracking reconciliation"
        );

        let ctx = Arc::new(PipelineContext {
            run_id: run_id.clone(),
            store: Arc::clone(&self.store),
            provider: Arc::clone(&self.provider),
            email: Arc::clone(&self.email),
            audit: self.audit.clone(),
            limiter: SlotLimiter::new(self.config.max_concurrency),
            deadline,
        });

        ctx.emit(AuditEvent::JobStarted {
            run_id: run_id.clone(),
            triggered_by,
            batch_size: orders.len(),
            max_concurrency: self.config.max_concurrency,
        })
        .await;

        let mut summary = RunSummary::new(run_id.clone(), started_at, orders.len());

        let (order_ids, handles): (Vec<String>, Vec<_>) = orders
            .into_iter()
            .map(|order| {
                let ctx = Arc::clone(&ctx);
                (order.id.clone(), tokio::spawn(process_order(ctx, order)))
            })
            .unzip();

        for (order_id, result) in order_ids.iter().zip(join_all(handles).await) {
            match result {
                Ok(outcome) => {
                    ORDERS_PROCESSED.with_label_values(&[outcome.label()]).inc();
                    summary.record(order_id, &outcome);
                }
                Err(join_error) => {
                    error!(run_id = %run_id, order_id = %order_id, error = %join_error, "Order pipeline crashed");
                    ORDERS_PROCESSED.with_label_values(&["failed"]).inc();
                    summary.record_crash(order_id, format!("pipeline crashed: {}", join_error));
                }
            }
        }

        summary.peak_concurrency = ctx.limiter.status().peak;
        summary.finished_at = Utc::now();

        JOB_RUNS.with_label_values(&["completed"]).inc();
        JOB_DURATION
            .with_label_values(&["completed"])
            .observe(clock.elapsed().as_secs_f64());

        if summary.timed_out() {
            warn!(
                run_id = %run_id,
                deferred = summary.deferred,
                "Run deadline reached, remaining orders deferred to next run"
            );
        }

        info!(
            run_id = %run_id,
            processed = summary.processed,
            notified = summary.notified,
            failed = summary.failed,
            anomalies = summary.anomalies,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            deferred = summary.deferred,
            recovered = summary.recovered,
            duration_ms = clock.elapsed().as_millis() as u64,
            "Tracking reconciliation finished"
        );

        ctx.emit(AuditEvent::JobCompleted {
            run_id,
            processed: summary.processed,
            notified: summary.notified,
            failed: summary.failed,
            anomalies: summary.anomalies,
            deferred: summary.deferred,
            duration_ms: clock.elapsed().as_millis() as u64,
        })
        .await;

        Ok(summary)
    }
}

/// One order, start to finish. Never returns an error; every path ends in an outcome.
async fn process_order(ctx: Arc<PipelineContext>, order: Order) -> OrderOutcome {
    let Some(_slot) = ctx.limiter.acquire_until(ctx.deadline).await else {
        debug!(order_id = %order.id, "No slot before deadline, deferring");
        return OrderOutcome::Deferred;
    };

    if order.is_settled() {
        return OrderOutcome::Skipped {
            reason: SkipReason::AlreadySettled,
        };
    }

    let Some(tracking_code) = order.tracking_code.as_deref().filter(|c| !c.is_empty()) else {
        return OrderOutcome::Skipped {
            reason: SkipReason::NoTrackingCode,
        };
    };

    let fetched = tokio::time::timeout_at(
        ctx.deadline,
        ctx.provider.get_shipment_status(tracking_code),
    )
    .await;

    let remote = match fetched {
        Err(_) => {
            debug!(order_id = %order.id, "Tracking lookup outlived the deadline, deferring");
            return OrderOutcome::Deferred;
        }
        Ok(Err(TrackingError::NotFound(_))) => {
            debug!(order_id = %order.id, tracking_code, "Tracking code not known to provider yet");
            note_checked(&ctx, &order, Utc::now());
            return OrderOutcome::Skipped {
                reason: SkipReason::NotFoundAtProvider,
            };
        }
        Ok(Err(e)) => {
            warn!(order_id = %order.id, error = %e, "Tracking lookup failed");
            note_checked(&ctx, &order, Utc::now());
            return OrderOutcome::Failed {
                error: ReconcileError::ProviderUnavailable(e),
            };
        }
        Ok(Ok(remote)) => remote,
    };

    let snapshot = StatusSnapshot {
        order_id: order.id.clone(),
        status: remote.status,
        raw_code: remote.raw_code,
        observed_at: remote.observed_at,
    };

    if order.pending_persist_status == Some(snapshot.status) {
        return recover_pending(&ctx, &order, &snapshot).await;
    }

    match evaluate(order.last_known_status, snapshot.status) {
        StatusDiff::Unrecognized => {
            warn!(
                order_id = %order.id,
                raw_code = %snapshot.raw_code,
                "Provider returned an unrecognised status code"
            );
            UNKNOWN_STATUSES.inc();
            note_checked(&ctx, &order, snapshot.observed_at);
            ctx.emit(AuditEvent::UnknownStatus {
                run_id: ctx.run_id.clone(),
                order_id: order.id.clone(),
                raw_code: snapshot.raw_code.clone(),
            })
            .await;
            OrderOutcome::Skipped {
                reason: SkipReason::UnknownStatus(ReconcileError::UnknownStatus {
                    raw_code: snapshot.raw_code,
                }),
            }
        }
        StatusDiff::Unchanged => {
            debug!(order_id = %order.id, status = %snapshot.status, "Status unchanged");
            note_checked(&ctx, &order, snapshot.observed_at);
            OrderOutcome::Unchanged
        }
        StatusDiff::InitialObservation => record_initial(&ctx, &order, &snapshot),
        StatusDiff::Notify { previous, current } => {
            notify_and_persist(&ctx, &order, &snapshot, previous, current).await
        }
    }
}

/// Move the order to the back of the polling queue. Status fields are untouched.
fn note_checked(ctx: &PipelineContext, order: &Order, at: DateTime<Utc>) {
    if let Err(e) = ctx.store.record_check(&order.id, at) {
        warn!(order_id = %order.id, error = %e, "Failed to record tracking check");
    }
}

/// Persist the first sighting of the initial status without emailing.
fn record_initial(ctx: &PipelineContext, order: &Order, snapshot: &StatusSnapshot) -> OrderOutcome {
    let update = StatusUpdate {
        order_id: order.id.clone(),
        expected_previous: order.last_known_status,
        new_status: snapshot.status,
        notified_at: None,
        checked_at: snapshot.observed_at,
    };

    match ctx.store.update_order_status(&update) {
        Ok(UpdateOutcome::Updated) => {
            debug!(order_id = %order.id, status = %snapshot.status, "Recorded initial status");
            OrderOutcome::Recorded {
                status: snapshot.status,
            }
        }
        Ok(UpdateOutcome::Conflict) => conflict(ctx, order),
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Failed to record initial status");
            OrderOutcome::Failed { error: e.into() }
        }
    }
}

fn conflict(ctx: &PipelineContext, order: &Order) -> OrderOutcome {
    let found = ctx
        .store
        .get(&order.id)
        .ok()
        .flatten()
        .and_then(|o| o.last_known_status);
    debug!(order_id = %order.id, expected = ?order.last_known_status, found = ?found, "Status write lost a race");
    OrderOutcome::Skipped {
        reason: SkipReason::Conflict(ReconcileError::PersistenceConflict {
            expected: order.last_known_status,
            found,
        }),
    }
}

/// Settle an order whose email already went out in an earlier run.
async fn recover_pending(
    ctx: &PipelineContext,
    order: &Order,
    snapshot: &StatusSnapshot,
) -> OrderOutcome {
    let update = StatusUpdate {
        order_id: order.id.clone(),
        expected_previous: order.last_known_status,
        new_status: snapshot.status,
        notified_at: order.pending_persist_at.or(Some(snapshot.observed_at)),
        checked_at: snapshot.observed_at,
    };

    match ctx.store.update_order_status(&update) {
        Ok(UpdateOutcome::Updated) => {
            info!(
                order_id = %order.id,
                status = %snapshot.status,
                "Recovered pending status write without resending"
            );
            ctx.emit(AuditEvent::AnomalyRecovered {
                run_id: ctx.run_id.clone(),
                order_id: order.id.clone(),
                status: snapshot.status.to_string(),
            })
            .await;
            OrderOutcome::Recovered {
                status: snapshot.status,
            }
        }
        Ok(UpdateOutcome::Conflict) => conflict(ctx, order),
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Failed to recover pending status");
            OrderOutcome::Failed { error: e.into() }
        }
    }
}

/// Re-check, send, then compare-and-set. The send is the point of no return.
async fn notify_and_persist(
    ctx: &PipelineContext,
    order: &Order,
    snapshot: &StatusSnapshot,
    previous: Option<ShipmentStatus>,
    current: ShipmentStatus,
) -> OrderOutcome {
    let fresh = match ctx.store.get(&order.id) {
        Ok(Some(fresh)) => fresh,
        Ok(None) => {
            return OrderOutcome::Skipped {
                reason: SkipReason::OrderMissing,
            }
        }
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Failed to re-read order before send");
            return OrderOutcome::Failed { error: e.into() };
        }
    };

    if fresh.last_known_status != previous || fresh.pending_persist_status == Some(current) {
        debug!(
            order_id = %order.id,
            expected = ?previous,
            found = ?fresh.last_known_status,
            "Order changed since batch load, skipping send"
        );
        return OrderOutcome::Skipped {
            reason: SkipReason::Conflict(ReconcileError::PersistenceConflict {
                expected: previous,
                found: fresh.last_known_status,
            }),
        };
    }

    let email = TrackingUpdateEmail {
        to: fresh.customer_email.clone(),
        order_id: order.id.clone(),
        status: current,
        tracking_code: fresh
            .tracking_code
            .clone()
            .or_else(|| order.tracking_code.clone())
            .unwrap_or_default(),
    };

    if let Err(e) = ctx.email.send_tracking_update(&email).await {
        warn!(order_id = %order.id, status = %current, error = %e, "Notification send failed");
        NOTIFICATIONS_FAILED.inc();
        note_checked(ctx, order, snapshot.observed_at);
        ctx.emit(AuditEvent::NotificationFailed {
            run_id: ctx.run_id.clone(),
            order_id: order.id.clone(),
            status: current.to_string(),
            error: e.to_string(),
        })
        .await;
        return OrderOutcome::Failed {
            error: ReconcileError::NotificationSendFailure(e),
        };
    }

    NOTIFICATIONS_SENT
        .with_label_values(&[current.as_str()])
        .inc();
    ctx.emit(AuditEvent::NotificationSent {
        run_id: ctx.run_id.clone(),
        order_id: order.id.clone(),
        previous_status: previous.map(|s| s.to_string()),
        new_status: current.to_string(),
    })
    .await;

    let sent_at = Utc::now();
    let update = StatusUpdate {
        order_id: order.id.clone(),
        expected_previous: previous,
        new_status: current,
        notified_at: Some(sent_at),
        checked_at: snapshot.observed_at,
    };

    let reason = match ctx.store.update_order_status(&update) {
        Ok(UpdateOutcome::Updated) => {
            info!(
                order_id = %order.id,
                previous = ?previous,
                status = %current,
                "Customer notified of shipment update"
            );
            return OrderOutcome::Notified { previous, current };
        }
        Ok(UpdateOutcome::Conflict) => "status changed between send and write".to_string(),
        Err(e) => e.to_string(),
    };

    let marker_written = match ctx.store.mark_pending_persist(&order.id, current, sent_at) {
        Ok(()) => true,
        Err(e) => {
            error!(order_id = %order.id, error = %e, "Failed to write pending-persist marker");
            false
        }
    };

    error!(
        order_id = %order.id,
        status = %current,
        reason = %reason,
        marker_written,
        "Reconciliation anomaly: notification sent but status not persisted"
    );
    RECONCILIATION_ANOMALIES.inc();
    ctx.emit(AuditEvent::ReconciliationAnomaly {
        run_id: ctx.run_id.clone(),
        order_id: order.id.clone(),
        status: current.to_string(),
        error: reason.clone(),
        marker_written,
    })
    .await;

    OrderOutcome::Anomaly {
        error: ReconcileError::PersistenceFailureAfterSend {
            status: current,
            reason,
        },
        marker_written,
    }
}
