//! Job run history

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::api::types::JobRunsResponse;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct JobRunsQuery {
    pub limit: Option<usize>,
}

/// GET /api/v1/jobs/runs?limit=N
///
/// Most recent job run reports first
pub async fn list_job_runs(
    State(state): State<ApiState>,
    Query(query): Query<JobRunsQuery>,
) -> ApiResult<Json<JobRunsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let runs = state.job_log.query_recent_job_runs(limit).await?;

    Ok(Json(JobRunsResponse {
        count: runs.len(),
        runs,
    }))
}
