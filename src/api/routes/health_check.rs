//! Manual health check runs and run lookup

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::api::types::{HealthCheckResponse, HealthRunResponse};

/// POST /api/v1/health-check
pub async fn run_health_check(
    State(state): State<ApiState>,
) -> ApiResult<Json<HealthCheckResponse>> {
    let summary = state.health_checks.run().await?;
    Ok(Json(summary.into()))
}

/// GET /api/v1/health-check/runs/:run_id
pub async fn get_health_run(
    State(state): State<ApiState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<HealthRunResponse>> {
    let records = state.health_log.query_health_run(&run_id).await?;
    if records.is_empty() {
        return Err(ApiError::NotFound(format!("no health check run {run_id}")));
    }

    Ok(Json(HealthRunResponse {
        run_id,
        count: records.len(),
        records,
    }))
}
