use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{anomalies, audit, handlers, jobs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Everything under /api/v1 except health requires authentication
    let protected_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/audit", get(audit::query_audit))
        .route("/audit/anomalies", get(audit::anomaly_history))
        .route("/runs/{run_id}/audit", get(audit::run_timeline))
        .route("/anomalies", get(anomalies::list_anomalies))
        .route(
            "/jobs/tracking-notifications",
            get(jobs::run_tracking_notifications).post(jobs::run_tracking_notifications),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
