//! Rate limit check and admin reset endpoints

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::api::error::ApiResult;
use crate::api::state::ApiState;
use crate::api::types::{ClearSubjectResponse, RateLimitCheckRequest, RateLimitCheckResponse};

/// POST /api/v1/rate-limit/check
///
/// - 200 with `allowed: false` when the limit is reached
/// - 400 for an unknown action, a malformed subject or an unreadable body
/// - 503 when the window store is unavailable (the attempt is not allowed)
#[instrument(skip_all)]
pub async fn check_rate_limit(
    State(state): State<ApiState>,
    payload: Result<Json<RateLimitCheckRequest>, JsonRejection>,
) -> ApiResult<Json<RateLimitCheckResponse>> {
    let Json(request) = payload?;
    let (action, decision) = state
        .limiter
        .check_and_record_str(&request.subject, &request.action, Utc::now())
        .await?;

    Ok(Json(RateLimitCheckResponse {
        allowed: decision.is_allowed(),
        retry_after_minutes: decision.retry_after_minutes(),
        message: decision.message(action),
    }))
}

/// DELETE /api/v1/rate-limit/:subject
///
/// Support escape hatch: forgets every window of the subject
#[instrument(skip_all)]
pub async fn clear_subject(
    State(state): State<ApiState>,
    Path(subject): Path<String>,
) -> ApiResult<Json<ClearSubjectResponse>> {
    let cleared = state.limiter.clear_subject(&subject).await?;
    info!("admin cleared {} windows", cleared);

    Ok(Json(ClearSubjectResponse { subject, cleared }))
}
