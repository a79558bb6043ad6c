//! Job trait and per-job reports

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Context handed to a job for one run
#[derive(Debug, Clone)]
pub struct JobContext {
    /// The tick that triggered this run (not the wall clock at job start)
    pub tick_at: DateTime<Utc>,
}

/// What a successful job run reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutcome {
    pub message: String,
    pub records_affected: u64,
}

impl JobOutcome {
    pub fn new(message: impl Into<String>, records_affected: u64) -> Self {
        Self {
            message: message.into(),
            records_affected,
        }
    }
}

/// A unit of background work triggered by the dispatcher
///
/// Errors are reported in-band by the dispatcher; a job never needs to catch
/// its own failures.
#[async_trait]
pub trait Job: Send + Sync {
    /// Unique name used in reports
    fn name(&self) -> &str;

    async fn run(&self, ctx: &JobContext) -> anyhow::Result<JobOutcome>;
}

/// Outcome of one configured job in one tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunReport {
    pub job_name: String,

    /// False when the job's schedule excluded it this tick
    pub triggered: bool,
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
    pub records_affected: u64,
}

impl JobRunReport {
    /// Report for a job that did not run this tick
    pub fn skipped(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            triggered: false,
            success: true,
            message: message.into(),
            duration_ms: 0,
            records_affected: 0,
        }
    }

    pub fn succeeded(job_name: impl Into<String>, outcome: JobOutcome, duration_ms: u64) -> Self {
        Self {
            job_name: job_name.into(),
            triggered: true,
            success: true,
            message: outcome.message,
            duration_ms,
            records_affected: outcome.records_affected,
        }
    }

    pub fn failed(job_name: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            job_name: job_name.into(),
            triggered: true,
            success: false,
            message: message.into(),
            duration_ms,
            records_affected: 0,
        }
    }
}
