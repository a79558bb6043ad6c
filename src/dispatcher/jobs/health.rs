//! Scheduled health check run

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatcher::{Job, JobContext, JobOutcome};
use crate::health::HealthCheckService;

/// Runs the health check service as a dispatcher job
#[derive(Clone)]
pub struct HealthCheckJob {
    name: String,
    service: Arc<HealthCheckService>,
}

impl HealthCheckJob {
    pub fn new(name: impl Into<String>, service: Arc<HealthCheckService>) -> Self {
        Self {
            name: name.into(),
            service,
        }
    }
}

#[async_trait]
impl Job for HealthCheckJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &JobContext) -> anyhow::Result<JobOutcome> {
        let summary = self.service.run_at(ctx.tick_at).await?;

        let mut message = format!(
            "{} valid, {} invalid of {} links (run {})",
            summary.valid, summary.invalid, summary.total, summary.run_id
        );
        if summary.not_attempted > 0 {
            message.push_str(&format!(", {} not attempted", summary.not_attempted));
        }
        if summary.invalid > 0 && !summary.notified {
            message.push_str(", alert delivery failed");
        }

        Ok(JobOutcome::new(message, summary.total as u64))
    }
}
