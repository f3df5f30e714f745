//! Audit trail views: a filtered search, the anomaly history, and the
//! timeline of a single reconciliation run.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shiptrack_core::{AuditFilter, AuditPage, AuditRecord, ShipmentStatus};
use std::sync::Arc;

use crate::state::AppState;

const MAX_LIMIT: i64 = 1000;
const DEFAULT_LIMIT: i64 = 100;

type AuditResult<T> = Result<Json<T>, (StatusCode, Json<AuditErrorResponse>)>;

#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub order_id: Option<String>,
    pub run_id: Option<String>,
    pub event_type: Option<String>,
    /// Shipment status the event is about (`delivered`, `in_transit`, ...)
    pub status: Option<ShipmentStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn page(limit: Option<i64>, offset: Option<i64>) -> AuditPage {
    AuditPage {
        limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset: offset.unwrap_or(0).max(0),
        oldest_first: false,
    }
}

#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    /// Matching events across all pages
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Every event of one run, oldest first.
#[derive(Debug, Serialize)]
pub struct RunTimelineResponse {
    pub run_id: String,
    pub events: Vec<AuditRecord>,
    pub notified: usize,
    pub anomalies: usize,
}

#[derive(Debug, Serialize)]
pub struct AuditErrorResponse {
    pub error: String,
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, Json<AuditErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AuditErrorResponse {
            error: format!("Audit store error: {}", e),
        }),
    )
}

fn search(state: &AppState, filter: AuditFilter, page: AuditPage) -> AuditResult<AuditQueryResponse> {
    let store = state.audit_store();
    let events = store.query(&filter, page).map_err(internal)?;
    let total = store.count(&filter).map_err(internal)?;

    Ok(Json(AuditQueryResponse {
        events,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// `GET /audit`
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> AuditResult<AuditQueryResponse> {
    let filter = AuditFilter {
        order_id: params.order_id,
        run_id: params.run_id,
        event_types: params.event_type.into_iter().collect(),
        status: params.status,
        since: params.since,
        until: params.until,
    };

    search(&state, filter, page(params.limit, params.offset))
}

/// `GET /audit/anomalies`: failed status writes after a send, and their repairs.
pub async fn anomaly_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> AuditResult<AuditQueryResponse> {
    search(&state, AuditFilter::anomalies(), page(params.limit, params.offset))
}

/// `GET /runs/{run_id}/audit`
pub async fn run_timeline(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> AuditResult<RunTimelineResponse> {
    let page = AuditPage {
        limit: MAX_LIMIT,
        offset: 0,
        oldest_first: true,
    };
    let events = state
        .audit_store()
        .query(&AuditFilter::for_run(run_id.clone()), page)
        .map_err(internal)?;

    if events.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(AuditErrorResponse {
                error: format!("No audit events for run {}", run_id),
            }),
        ));
    }

    let count = |event_type: &str| events.iter().filter(|e| e.event_type == event_type).count();
    let notified = count("notification_sent");
    let anomalies = count("reconciliation_anomaly");

    Ok(Json(RunTimelineResponse {
        run_id,
        events,
        notified,
        anomalies,
    }))
}
