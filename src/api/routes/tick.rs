//! Dispatcher tick endpoint

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{Instrument, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::dispatcher::TickReport;
use crate::storage::JobRunRow;

#[derive(Debug, Deserialize)]
pub struct TickParams {
    /// Replay a tick for a specific instant (RFC 3339)
    pub at: Option<DateTime<Utc>>,
}

/// POST /api/v1/tick
///
/// Job failures are reported in the body; the status is 200 whenever the
/// tick itself ran. The tick and its persistence run in their own task and
/// complete even if the client disconnects first.
#[instrument(skip(state))]
pub async fn run_tick(
    State(state): State<ApiState>,
    Query(params): Query<TickParams>,
) -> ApiResult<Json<TickReport>> {
    let now = params.at.unwrap_or_else(Utc::now);

    let report = tokio::spawn(
        async move {
            let report = state.dispatcher.tick(now).await;
            record_tick(&state, &report).await;
            report
        }
        .in_current_span(),
    )
    .await
    .map_err(|e| ApiError::Internal(format!("tick task failed: {e}")))?;

    Ok(Json(report))
}

async fn record_tick(state: &ApiState, report: &TickReport) {
    let rows = report
        .jobs
        .iter()
        .cloned()
        .map(|job| JobRunRow {
            tick_at: report.tick_at,
            report: job,
        })
        .collect();

    if let Err(e) = state.job_log.append_job_runs(rows).await {
        warn!("failed to persist tick report: {}", e);
    }
}
