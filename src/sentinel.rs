//! Wiring of configured components around one storage backend

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, JobConfig, JobKind, StorageConfig};
use crate::dispatcher::jobs::{HealthCheckJob, HttpJob, RetentionJob};
use crate::dispatcher::{Dispatcher, Job, ScheduledJob};
use crate::health::{FileTargetSource, HealthAggregator, HealthCheckService, StaticTargetSource, TargetSource};
use crate::notify;
use crate::prober::Prober;
use crate::rate_limit::RateLimiter;
use crate::storage::{HealthLog, JobRunLog, MemoryBackend, StorageBackend};

/// Everything the hub serves, built from one configuration
#[derive(Clone)]
pub struct Sentinel {
    pub limiter: RateLimiter,
    pub dispatcher: Arc<Dispatcher>,
    pub health_checks: Arc<HealthCheckService>,
    pub health_log: Arc<dyn HealthLog>,
    pub job_log: Arc<dyn JobRunLog>,
    pub storage: Arc<dyn StorageBackend>,
}

impl Sentinel {
    /// Build all components over an already opened backend
    pub fn build<B>(config: &Config, storage: Arc<B>) -> anyhow::Result<Self>
    where
        B: StorageBackend + 'static,
    {
        let limiter = RateLimiter::with_limits(storage.clone(), config.action_limits());

        let prober = Prober::new(config.probe_options())?;
        let targets: Arc<dyn TargetSource> = match &config.health.targets_file {
            Some(path) => Arc::new(FileTargetSource::new(path)),
            None => {
                warn!("no health.targets_file configured, health checks have no targets");
                Arc::new(StaticTargetSource::default())
            }
        };
        let health_checks = Arc::new(HealthCheckService::new(
            HealthAggregator::new(
                prober,
                storage.clone(),
                notify::from_config(config.notification.as_ref()),
            ),
            targets,
        ));

        let jobs = config
            .jobs
            .iter()
            .map(|job| {
                ScheduledJob::new(
                    build_job(job, config, &limiter, &health_checks, storage.clone()),
                    job.schedule,
                )
            })
            .collect();
        let dispatcher = Arc::new(Dispatcher::new(jobs, config.tick_timeout()));

        info!(
            "configured {} jobs: {:?}",
            config.jobs.len(),
            dispatcher.jobs()
        );

        Ok(Self {
            limiter,
            dispatcher,
            health_checks,
            health_log: storage.clone(),
            job_log: storage.clone(),
            storage,
        })
    }

    /// Open the configured backend and build all components
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        match &config.storage {
            StorageConfig::None => {
                info!("using in-memory storage");
                Self::build(config, Arc::new(MemoryBackend::new()))
            }
            #[cfg(feature = "storage-sqlite")]
            StorageConfig::Sqlite { path, .. } => {
                let backend = crate::storage::sqlite::SqliteBackend::new(path).await?;
                Self::build(config, Arc::new(backend))
            }
            #[cfg(not(feature = "storage-sqlite"))]
            StorageConfig::Sqlite { .. } => {
                anyhow::bail!("SQLite storage requested but the storage-sqlite feature is disabled")
            }
        }
    }
}

fn build_job(
    job: &JobConfig,
    config: &Config,
    limiter: &RateLimiter,
    health_checks: &Arc<HealthCheckService>,
    health_log: Arc<dyn HealthLog>,
) -> Arc<dyn Job> {
    match &job.kind {
        JobKind::Http {
            url,
            token,
            timeout_secs,
        } => Arc::new(
            HttpJob::new(
                job.name.clone(),
                url.clone(),
                std::time::Duration::from_secs(*timeout_secs),
            )
            .with_token(token.clone()),
        ),
        JobKind::HealthCheck => Arc::new(HealthCheckJob::new(
            job.name.clone(),
            Arc::clone(health_checks),
        )),
        JobKind::Retention => Arc::new(RetentionJob::new(
            job.name.clone(),
            limiter.clone(),
            health_log,
            config.storage.retention_days(),
        )),
    }
}
