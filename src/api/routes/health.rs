//! Liveness endpoint

use axum::{Json, extract::State};
use tracing::warn;

use crate::api::state::ApiState;
use crate::api::types::{HealthResponse, StorageStatus};

/// GET /api/v1/health
///
/// Always answers 200; storage trouble is reported in the body
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let storage = match state.storage.health_check().await {
        Ok(status) => StorageStatus {
            healthy: status.healthy,
            message: status.message,
        },
        Err(e) => {
            warn!("storage health check failed: {}", e);
            StorageStatus {
                healthy: false,
                message: e.to_string(),
            }
        }
    };

    Json(HealthResponse {
        status: if storage.healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage,
    })
}
