use std::sync::Arc;

use shiptrack_core::{
    AuditStore, Authenticator, Config, OrderStore, SanitizedConfig, TrackingReconciliationJob,
};
use tokio::sync::Mutex;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit_store: Arc<dyn AuditStore>,
    order_store: Arc<dyn OrderStore>,
    /// Absent when tracking or email is not configured.
    job: Option<Arc<TrackingReconciliationJob>>,
    /// Held for the duration of a reconciliation run.
    run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit_store: Arc<dyn AuditStore>,
        order_store: Arc<dyn OrderStore>,
        job: Option<Arc<TrackingReconciliationJob>>,
    ) -> Self {
        Self {
            config,
            authenticator,
            audit_store,
            order_store,
            job,
            run_lock: Mutex::new(()),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn order_store(&self) -> &dyn OrderStore {
        self.order_store.as_ref()
    }

    pub fn job(&self) -> Option<&TrackingReconciliationJob> {
        self.job.as_deref()
    }

    pub fn run_lock(&self) -> &Mutex<()> {
        &self.run_lock
    }
}
