//! Health check runs over the regulatory link list
//!
//! A run probes every target, appends one [`HealthCheckRecord`] per target to
//! the health log under a fresh run id, and alerts when anything is broken.
//!
//! ```text
//! TargetSource → Prober::probe_all → HealthLog::append_health_records
//!                                   └─ invalid > 0 → Notifier::send_broken_links
//! ```
//!
//! Only a storage failure fails the run. A notification failure is logged
//! and reported through `HealthSummary::notified`.

pub mod targets;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::notify::{BrokenLinksReport, Notifier};
use crate::prober::{ProbeResult, ProbeTarget, Prober};
use crate::storage::{HealthCheckRecord, HealthLog, StorageError};

pub use targets::{FileTargetSource, StaticTargetSource, TargetSource};

/// Errors that abort a health check run
#[derive(Debug)]
pub enum HealthCheckError {
    /// The target list could not be loaded
    Targets(String),

    /// The health log could not be written
    Storage(StorageError),
}

impl fmt::Display for HealthCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthCheckError::Targets(msg) => write!(f, "failed to load targets: {}", msg),
            HealthCheckError::Storage(err) => write!(f, "failed to persist health records: {}", err),
        }
    }
}

impl std::error::Error for HealthCheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HealthCheckError::Storage(err) => Some(err),
            HealthCheckError::Targets(_) => None,
        }
    }
}

impl From<StorageError> for HealthCheckError {
    fn from(err: StorageError) -> Self {
        HealthCheckError::Storage(err)
    }
}

/// Outcome of one health check run
#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub run_id: String,
    pub checked_at: DateTime<Utc>,

    /// Targets in the run
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,

    /// Targets without a result because the outer deadline elapsed
    pub not_attempted: usize,

    /// Whether a broken-link alert was handed off successfully
    pub notified: bool,

    /// Records of the unreachable targets
    pub broken: Vec<HealthCheckRecord>,
}

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique-per-process run id, ordered by start time
pub fn next_run_id(now: DateTime<Utc>) -> String {
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("hc-{}-{:04}", now.format("%Y%m%dT%H%M%S%3f"), seq % 10_000)
}

/// Probes, records and alerts
#[derive(Clone)]
pub struct HealthAggregator {
    prober: Prober,
    log: Arc<dyn HealthLog>,
    notifier: Arc<dyn Notifier>,
}

impl HealthAggregator {
    pub fn new(prober: Prober, log: Arc<dyn HealthLog>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            prober,
            log,
            notifier,
        }
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// Run one health check over `targets`
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn run_health_check(
        &self,
        targets: &[ProbeTarget],
        now: DateTime<Utc>,
    ) -> Result<HealthSummary, HealthCheckError> {
        let run_id = next_run_id(now);
        let batch = self.prober.probe_all(targets).await;

        // Targets sharing a URL share its result but keep their own owner tag
        let by_url: HashMap<&str, &ProbeResult> = batch
            .results
            .iter()
            .map(|result| (result.url.as_str(), result))
            .collect();

        let records: Vec<HealthCheckRecord> = targets
            .iter()
            .filter_map(|target| {
                by_url
                    .get(target.url.as_str())
                    .map(|result| HealthCheckRecord::from_probe(&run_id, now, target, result))
            })
            .collect();

        self.log.append_health_records(records.clone()).await?;

        let valid = records.iter().filter(|r| r.reachable).count();
        let invalid = records.len() - valid;
        let total = targets.len();

        info!(
            "health check {}: {} valid, {} invalid, {} not attempted",
            run_id, valid, invalid, batch.not_attempted
        );

        let mut notified = false;
        if invalid > 0 {
            let report = BrokenLinksReport::from_records(&run_id, now, total, &records);
            match self.notifier.send_broken_links(&report).await {
                Ok(()) => notified = true,
                Err(e) => error!("broken link notification failed: {}", e),
            }
        }

        let broken = records.into_iter().filter(|r| !r.reachable).collect();

        Ok(HealthSummary {
            run_id,
            checked_at: now,
            total,
            valid,
            invalid,
            not_attempted: batch.not_attempted,
            notified,
            broken,
        })
    }
}

/// Aggregator bound to a target source, for manual and scheduled runs
#[derive(Clone)]
pub struct HealthCheckService {
    aggregator: HealthAggregator,
    targets: Arc<dyn TargetSource>,
}

impl HealthCheckService {
    pub fn new(aggregator: HealthAggregator, targets: Arc<dyn TargetSource>) -> Self {
        Self {
            aggregator,
            targets,
        }
    }

    pub async fn run(&self) -> Result<HealthSummary, HealthCheckError> {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<HealthSummary, HealthCheckError> {
        let targets = self.targets.load().await?;
        if targets.is_empty() {
            warn!("target list is empty");
        }
        self.aggregator.run_health_check(&targets, now).await
    }
}
