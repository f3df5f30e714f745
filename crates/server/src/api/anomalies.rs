//! Orders awaiting manual reconciliation.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shiptrack_core::Order;
use std::sync::Arc;

use crate::state::AppState;

const MAX_LIMIT: usize = 1000;
const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListAnomaliesParams {
    pub limit: Option<usize>,
}

/// An order whose email went out while its status write failed.
#[derive(Debug, Serialize)]
pub struct AnomalyResponse {
    pub order_id: String,
    pub tracking_code: Option<String>,
    pub persisted_status: Option<String>,
    pub notified_status: Option<String>,
    pub notified_at: Option<String>,
}

impl From<Order> for AnomalyResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            tracking_code: order.tracking_code,
            persisted_status: order.last_known_status.map(|s| s.to_string()),
            notified_status: order.pending_persist_status.map(|s| s.to_string()),
            notified_at: order.pending_persist_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListAnomaliesResponse {
    pub anomalies: Vec<AnomalyResponse>,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct AnomalyErrorResponse {
    pub error: String,
}

/// List orders carrying a pending-persist marker, oldest first.
pub async fn list_anomalies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAnomaliesParams>,
) -> Result<Json<ListAnomaliesResponse>, (StatusCode, Json<AnomalyErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let orders = state
        .order_store()
        .list_pending_anomalies(limit)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AnomalyErrorResponse {
                    error: format!("Failed to list anomalies: {}", e),
                }),
            )
        })?;

    Ok(Json(ListAnomaliesResponse {
        anomalies: orders.into_iter().map(AnomalyResponse::from).collect(),
        limit,
    }))
}
