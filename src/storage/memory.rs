//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Deployments that only need rate limiting within one process lifetime
//!
//! ## Locking
//!
//! Rate-limit windows live in per-key slots (`Arc<Mutex<Option<Window>>>`).
//! The outer map lock is only held long enough to find or create a slot, so
//! callers for different keys never wait on each other's read-check-write.
//!
//! ## Limitations
//!
//! - **No persistence**: all data lost on restart
//! - **Bounded job history**: only the most recent job runs are kept

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use super::backend::{HealthLog, HealthStatus, JobRunLog, RateLimitStore, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{HealthCheckRecord, JobRunRow};
use crate::rate_limit::{Action, ActionLimits, AttemptOutcome, RateLimitWindow};

/// Maximum job runs kept in memory
const MAX_JOB_RUNS: usize = 1000;

type WindowKey = (String, Action);
type WindowSlot = Arc<Mutex<Option<RateLimitWindow>>>;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    windows: StdMutex<HashMap<WindowKey, WindowSlot>>,
    health_records: RwLock<Vec<HealthCheckRecord>>,
    job_runs: Mutex<VecDeque<JobRunRow>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    fn windows(
        &self,
    ) -> StorageResult<std::sync::MutexGuard<'_, HashMap<WindowKey, WindowSlot>>> {
        self.windows
            .lock()
            .map_err(|_| StorageError::UnhealthyBackend("window map lock poisoned".to_string()))
    }

    /// Find or create the slot for a key
    fn slot(&self, subject: &str, action: Action) -> StorageResult<WindowSlot> {
        let mut windows = self.windows()?;
        let slot = windows
            .entry((subject.to_string(), action))
            .or_insert_with(|| Arc::new(Mutex::new(None)));
        Ok(Arc::clone(slot))
    }

    /// Number of health records stored (all runs)
    pub async fn health_record_count(&self) -> usize {
        self.health_records.read().await.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryBackend {
    async fn record_attempt(
        &self,
        subject: &str,
        action: Action,
        limits: &ActionLimits,
        now: DateTime<Utc>,
    ) -> StorageResult<AttemptOutcome> {
        let slot = self.slot(subject, action)?;
        let mut window = slot.lock().await;

        let outcome = RateLimitWindow::apply_attempt(window.as_ref(), subject, action, limits, now);
        if !matches!(outcome, AttemptOutcome::Rejected(_)) {
            *window = Some(outcome.window().clone());
        }

        trace!("{subject}/{action}: {outcome:?}");
        Ok(outcome)
    }

    async fn get_window(
        &self,
        subject: &str,
        action: Action,
    ) -> StorageResult<Option<RateLimitWindow>> {
        let slot = {
            let windows = self.windows()?;
            windows.get(&(subject.to_string(), action)).cloned()
        };

        match slot {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn clear_subject(&self, subject: &str) -> StorageResult<usize> {
        let slots: Vec<WindowSlot> = {
            let windows = self.windows()?;
            windows
                .iter()
                .filter(|((s, _), _)| s == subject)
                .map(|(_, slot)| Arc::clone(slot))
                .collect()
        };

        // Empty the slots instead of removing them so a concurrent attempt
        // holding the same slot cannot write into a detached window.
        let mut cleared = 0;
        for slot in slots {
            if slot.lock().await.take().is_some() {
                cleared += 1;
            }
        }

        debug!("cleared {cleared} windows for {subject}");
        Ok(cleared)
    }

    async fn purge_expired_windows(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let mut windows = self.windows()?;
        let mut purged = 0;

        windows.retain(|_, slot| {
            // Someone else holds this slot: keep it
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(window) => match window.as_ref() {
                    Some(w) if w.is_expired(now) => {
                        purged += 1;
                        false
                    }
                    Some(_) => true,
                    // Emptied by clear_subject
                    None => false,
                },
                Err(_) => true,
            }
        });

        Ok(purged)
    }
}

#[async_trait]
impl HealthLog for MemoryBackend {
    async fn append_health_records(&self, records: Vec<HealthCheckRecord>) -> StorageResult<()> {
        debug!("appending {} health records in memory", records.len());
        self.health_records.write().await.extend(records);
        Ok(())
    }

    async fn query_health_run(&self, run_id: &str) -> StorageResult<Vec<HealthCheckRecord>> {
        let records = self.health_records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn query_latest_for_url(
        &self,
        url: &str,
        limit: usize,
    ) -> StorageResult<Vec<HealthCheckRecord>> {
        let records = self.health_records.read().await;
        let mut matching: Vec<HealthCheckRecord> =
            records.iter().filter(|r| r.url == url).cloned().collect();
        matching.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn cleanup_old_health_records(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut records = self.health_records.write().await;
        let count = records.len();
        records.retain(|r| r.checked_at >= before);
        Ok(count - records.len())
    }
}

#[async_trait]
impl JobRunLog for MemoryBackend {
    async fn append_job_runs(&self, runs: Vec<JobRunRow>) -> StorageResult<()> {
        let mut job_runs = self.job_runs.lock().await;
        for run in runs {
            if job_runs.len() == MAX_JOB_RUNS {
                job_runs.pop_front();
            }
            job_runs.push_back(run);
        }
        Ok(())
    }

    async fn query_recent_job_runs(&self, limit: usize) -> StorageResult<Vec<JobRunRow>> {
        let job_runs = self.job_runs.lock().await;
        Ok(job_runs.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let windows = self.windows()?.len();
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("windows".to_string(), windows.to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let windows = self.windows()?.len();
        Ok(format!(
            "In-Memory: {} rate limit windows, {} health records, {} job runs",
            windows,
            self.health_records.read().await.len(),
            self.job_runs.lock().await.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
