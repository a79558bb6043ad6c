//! Storage backend trait definitions
//!
//! Persistence is split along the three record families so that each
//! component depends only on what it writes:
//!
//! - [`RateLimitStore`] — used by the rate limiter
//! - [`HealthLog`] — used by the health aggregator
//! - [`JobRunLog`] — used by the hub to keep tick history
//!
//! [`StorageBackend`] bundles all three with maintenance operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{HealthCheckRecord, JobRunRow};
use crate::rate_limit::{Action, ActionLimits, AttemptOutcome, RateLimitWindow};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Window storage for the rate limiter
///
/// ## Atomicity
///
/// `record_attempt` must perform its read-check-write as one atomic step with
/// respect to other callers for the same `(subject, action)` key, and must
/// not serialize callers for different keys behind one another. It performs
/// exactly one write unless the outcome is `Rejected`, in which case it
/// writes nothing.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Apply one attempt to the window for `(subject, action)`
    ///
    /// The transition itself is [`RateLimitWindow::apply_attempt`].
    async fn record_attempt(
        &self,
        subject: &str,
        action: Action,
        limits: &ActionLimits,
        now: DateTime<Utc>,
    ) -> StorageResult<AttemptOutcome>;

    /// Read the stored window without modifying it
    async fn get_window(&self, subject: &str, action: Action)
    -> StorageResult<Option<RateLimitWindow>>;

    /// Delete every window for a subject across all actions
    ///
    /// Returns the number of windows removed.
    async fn clear_subject(&self, subject: &str) -> StorageResult<usize>;

    /// Delete windows whose reset time has passed
    async fn purge_expired_windows(&self, now: DateTime<Utc>) -> StorageResult<usize>;
}

/// Append-only health check history
#[async_trait]
pub trait HealthLog: Send + Sync {
    /// Append a batch of records (never overwrites existing history)
    async fn append_health_records(&self, records: Vec<HealthCheckRecord>) -> StorageResult<()>;

    /// All records of one run
    async fn query_health_run(&self, run_id: &str) -> StorageResult<Vec<HealthCheckRecord>>;

    /// The N most recent records for a URL, newest first
    async fn query_latest_for_url(
        &self,
        url: &str,
        limit: usize,
    ) -> StorageResult<Vec<HealthCheckRecord>>;

    /// Delete records checked before the given timestamp
    ///
    /// Used for retention; returns the number of records deleted.
    async fn cleanup_old_health_records(&self, before: DateTime<Utc>) -> StorageResult<usize>;
}

/// Append-only dispatcher job history
#[async_trait]
pub trait JobRunLog: Send + Sync {
    async fn append_job_runs(&self, runs: Vec<JobRunRow>) -> StorageResult<()>;

    /// The N most recent job runs, newest first
    async fn query_recent_job_runs(&self, limit: usize) -> StorageResult<Vec<JobRunRow>>;
}

/// Trait for persistent storage backends
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across request
/// handlers and dispatcher jobs.
#[async_trait]
pub trait StorageBackend: RateLimitStore + HealthLog + JobRunLog {
    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend is operational.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Get backend-specific statistics as a human-readable line
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
