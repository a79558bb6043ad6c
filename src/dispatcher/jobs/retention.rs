//! Periodic cleanup of expired windows and old health history

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::info;

use crate::dispatcher::{Job, JobContext, JobOutcome};
use crate::rate_limit::RateLimiter;
use crate::storage::HealthLog;

/// Purges expired rate-limit windows and health records past retention
#[derive(Clone)]
pub struct RetentionJob {
    name: String,
    limiter: RateLimiter,
    health_log: Arc<dyn HealthLog>,
    retention: Duration,
}

impl RetentionJob {
    pub fn new(
        name: impl Into<String>,
        limiter: RateLimiter,
        health_log: Arc<dyn HealthLog>,
        retention_days: u32,
    ) -> Self {
        Self {
            name: name.into(),
            limiter,
            health_log,
            retention: Duration::days(i64::from(retention_days)),
        }
    }
}

#[async_trait]
impl Job for RetentionJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &JobContext) -> anyhow::Result<JobOutcome> {
        let windows = self.limiter.purge_expired(ctx.tick_at).await?;

        let cutoff = ctx.tick_at - self.retention;
        let records = self.health_log.cleanup_old_health_records(cutoff).await?;

        info!(
            "purged {} expired windows and {} health records before {}",
            windows, records, cutoff
        );

        Ok(JobOutcome::new(
            format!("purged {windows} expired windows and {records} health records"),
            (windows + records) as u64,
        ))
    }
}
