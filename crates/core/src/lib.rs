pub mod audit;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod order;
pub mod reconcile;
pub mod shipment;
pub mod testing;
pub mod tracking;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditEventEnvelope, AuditFilter, AuditHandle,
    AuditPage, AuditRecord, AuditStore, AuditWriter, SqliteAuditStore, ANOMALY_EVENT_TYPES,
};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    config_path_from_env, load_config, load_config_from_str, validate_config, AuthConfig,
    AuthMethod, Config, ConfigError, DatabaseConfig, EmailConfig, JobConfig, SanitizedConfig,
    ServerConfig, TrackingConfig,
};
pub use notify::{EmailError, EmailSender, HttpEmailSender, TrackingUpdateEmail};
pub use order::{
    CreateOrderRequest, Order, OrderQuery, OrderStore, SqliteOrderStore, StatusUpdate,
    StoreError, UpdateOutcome,
};
pub use reconcile::{
    IssueKind, JobError, OrderIssue, OrderOutcome, ReconcileError, RunOptions, RunSummary,
    SkipReason, TrackingReconciliationJob, MAX_RUN_TIMEOUT,
};
pub use shipment::{evaluate, ShipmentStatus, StatusDiff, StatusSnapshot};
pub use tracking::{HttpTrackingProvider, RemoteStatus, TrackingError, TrackingProvider};
