//! Persisted row definitions
//!
//! ## Tables
//!
//! - `rate_limit_windows` — one row per live `(subject, action)` window,
//!   written with upsert-by-key semantics
//! - `health_check_records` — append-only probe history; a URL's current
//!   state is its row with the latest `checked_at`
//! - `job_runs` — append-only dispatcher tick reports
//!
//! Timestamps are stored as Unix milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatcher::JobRunReport;
use crate::prober::types::describe_failure;
use crate::prober::{ProbeCategory, ProbeErrorKind, ProbeResult, ProbeTarget};

/// One probe result, flattened with its target, as stored in the health log
///
/// Records are never updated. A newer record for the same URL supersedes
/// older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    /// Groups all records produced by one health check run
    pub run_id: String,
    pub checked_at: DateTime<Utc>,

    // === Target ===
    pub url: String,
    pub category: ProbeCategory,
    pub owner_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    // === Result ===
    pub reachable: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub error_kind: ProbeErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl HealthCheckRecord {
    pub fn from_probe(
        run_id: &str,
        checked_at: DateTime<Utc>,
        target: &ProbeTarget,
        result: &ProbeResult,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            checked_at,
            url: result.url.clone(),
            category: target.category,
            owner_tag: target.owner_tag.clone(),
            title: target.title.clone(),
            reachable: result.reachable,
            status_code: result.status_code,
            latency_ms: result.latency_ms,
            error_kind: result.error_kind,
            error_message: result.error_message.clone(),
        }
    }

    /// Short failure description (None for reachable records)
    pub fn failure_reason(&self) -> Option<String> {
        describe_failure(
            self.reachable,
            self.error_kind,
            self.status_code,
            self.error_message.as_deref(),
        )
    }
}

/// A job run report together with the tick that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunRow {
    pub tick_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: JobRunReport,
}
