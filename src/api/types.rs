//! API request and response types

use serde::{Deserialize, Serialize};

use crate::health::HealthSummary;
use crate::storage::{HealthCheckRecord, JobRunRow};

/// GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub storage: StorageStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStatus {
    pub healthy: bool,
    pub message: String,
}

/// POST /api/v1/rate-limit/check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitCheckRequest {
    pub subject: String,

    /// Wire name of the action; validated by the handler
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitCheckResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_minutes: Option<i64>,
    pub message: String,
}

/// DELETE /api/v1/rate-limit/:subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearSubjectResponse {
    pub subject: String,
    pub cleared: usize,
}

/// POST /api/v1/health-check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub run_id: String,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub not_attempted: usize,
    pub notified: bool,
}

impl From<HealthSummary> for HealthCheckResponse {
    fn from(summary: HealthSummary) -> Self {
        Self {
            run_id: summary.run_id,
            total: summary.total,
            valid: summary.valid,
            invalid: summary.invalid,
            not_attempted: summary.not_attempted,
            notified: summary.notified,
        }
    }
}

/// GET /api/v1/health-check/runs/:run_id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRunResponse {
    pub run_id: String,
    pub count: usize,
    pub records: Vec<HealthCheckRecord>,
}

/// GET /api/v1/jobs/runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunsResponse {
    pub count: usize,
    pub runs: Vec<JobRunRow>,
}
