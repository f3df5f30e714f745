use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// Background task that receives audit events and writes them to storage
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Run the writer, consuming events until every handle is dropped.
    ///
    /// Spawn with `tokio::spawn(writer.run())`.
    pub async fn run(mut self) {
        tracing::info!("Audit writer started");

        while let Some(envelope) = self.rx.recv().await {
            let record = AuditRecord::new(envelope.timestamp, envelope.event);

            if let Err(e) = self.store.insert(&record) {
                tracing::error!(
                    error = %e,
                    event_type = %record.event_type,
                    "Failed to write audit event"
                );
            }
        }

        tracing::info!("Audit writer shutting down");
    }
}

/// Create a complete audit system
///
/// Returns:
/// - `AuditHandle` - for emitting events (clone this to share across tasks)
/// - `AuditWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = AuditHandle::new(tx);
    let writer = AuditWriter::new(rx, store);
    (handle, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEvent, AuditFilter, AuditPage, SqliteAuditStore};

    #[tokio::test]
    async fn test_writer_stores_events_with_order_and_run_ids() {
        let store = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let (handle, writer) = create_audit_system(store.clone(), 10);
        let writer_task = tokio::spawn(writer.run());

        handle
            .emit(AuditEvent::NotificationSent {
                run_id: "run-1".to_string(),
                order_id: "ord-1".to_string(),
                previous_status: Some("in_transit".to_string()),
                new_status: "delivered".to_string(),
            })
            .await;
        handle
            .emit(AuditEvent::JobFailed {
                run_id: "run-1".to_string(),
                error: "database unavailable".to_string(),
            })
            .await;

        drop(handle);
        writer_task.await.unwrap();

        let records = store
            .query(&AuditFilter::for_run("run-1"), AuditPage::default())
            .unwrap();
        assert_eq!(records.len(), 2);

        let sent = store
            .query(&AuditFilter::for_order("ord-1"), AuditPage::default())
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_type, "notification_sent");
    }

    #[tokio::test]
    async fn test_writer_exits_when_handles_dropped() {
        let store = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let (handle, writer) = create_audit_system(store.clone(), 4);
        let writer_task = tokio::spawn(writer.run());

        let clone = handle.clone();
        drop(handle);
        clone
            .emit(AuditEvent::ServiceStopped {
                reason: "shutdown".to_string(),
            })
            .await;
        drop(clone);

        writer_task.await.unwrap();
        assert_eq!(store.count(&AuditFilter::default()).unwrap(), 1);
    }
}
