//! Reconciliation job trigger.
//!
//! The scheduler hits this endpoint on every tick (GET or POST, whichever
//! its cron facility supports). The run happens inline and the response is
//! the run summary.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shiptrack_core::{RunOptions, RunSummary, MAX_RUN_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::middleware::AuthUser;
use crate::state::AppState;

/// Largest batch a single request may ask for.
const MAX_BATCH_SIZE: usize = 1000;

/// Per-run overrides of the configured job settings.
#[derive(Debug, Deserialize)]
pub struct RunJobParams {
    pub batch_size: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

fn job_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<JobErrorResponse>) {
    (
        status,
        Json(JobErrorResponse {
            error: message.into(),
        }),
    )
}

/// Run one tracking-notification reconciliation pass.
pub async fn run_tracking_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<RunJobParams>,
) -> Result<Json<RunSummary>, (StatusCode, Json<JobErrorResponse>)> {
    let Some(job) = state.job() else {
        return Err(job_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Tracking and email providers are not configured",
        ));
    };

    let mut options = RunOptions::new().triggered_by(user_id);

    if let Some(batch_size) = params.batch_size {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(job_error(
                StatusCode::BAD_REQUEST,
                format!("batch_size must be between 1 and {}", MAX_BATCH_SIZE),
            ));
        }
        options = options.with_batch_size(batch_size);
    }

    if let Some(timeout_secs) = params.timeout_secs {
        let max_secs = MAX_RUN_TIMEOUT.as_secs();
        if timeout_secs == 0 || timeout_secs > max_secs {
            return Err(job_error(
                StatusCode::BAD_REQUEST,
                format!("timeout_secs must be between 1 and {}", max_secs),
            ));
        }
        options = options.with_timeout(Duration::from_secs(timeout_secs));
    }

    // One run at a time per process.
    let Ok(_guard) = state.run_lock().try_lock() else {
        info!("Reconciliation run requested while another is in progress");
        return Err(job_error(
            StatusCode::CONFLICT,
            "A reconciliation run is already in progress",
        ));
    };

    match job.run(options).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            error!(error = %e, "Reconciliation run failed");
            Err(job_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
