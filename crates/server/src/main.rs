use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shiptrack_core::{
    config_path_from_env, create_audit_system, create_authenticator, load_config,
    validate_config, AuditEvent, AuditStore, Authenticator, EmailSender, HttpEmailSender,
    HttpTrackingProvider, OrderStore, SqliteAuditStore, SqliteOrderStore,
    TrackingProvider, TrackingReconciliationJob,
};
use shiptrack_server::api::create_router;
use shiptrack_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = config_path_from_env();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        auth_method = config.auth.method.as_str(),
        database = ?config.database.path,
        batch_size = config.job.batch_size,
        max_concurrency = config.job.max_concurrency,
        "Configuration loaded"
    );

    // Short hash of the effective config, recorded with ServiceStarted
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    let order_store: Arc<dyn OrderStore> = Arc::new(
        SqliteOrderStore::new(&config.database.path).context("Failed to create order store")?,
    );
    info!("Stores initialized");

    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    let job = match (&config.tracking, &config.email) {
        (Some(tracking_config), Some(email_config)) => {
            let provider: Arc<dyn TrackingProvider> = Arc::new(
                HttpTrackingProvider::new(tracking_config.clone())
                    .context("Failed to create tracking provider")?,
            );
            let email: Arc<dyn EmailSender> = Arc::new(
                HttpEmailSender::new(email_config.clone())
                    .context("Failed to create email sender")?,
            );
            info!(
                tracking_url = %tracking_config.base_url,
                email_url = %email_config.base_url,
                "Tracking reconciliation job enabled"
            );
            Some(Arc::new(
                TrackingReconciliationJob::new(
                    Arc::clone(&order_store),
                    provider,
                    email,
                    config.job.clone(),
                )
                .with_audit(audit_handle.clone()),
            ))
        }
        _ => {
            warn!("[tracking] or [email] not configured, job endpoint disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        audit_store,
        order_store,
        job,
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The writer exits once every handle is gone. The job's clone went
    // with the router when serve returned.
    drop(audit_handle);
    let _ = writer_handle.await;
    info!("Audit writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
