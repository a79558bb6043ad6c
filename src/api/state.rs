//! API shared state

use std::sync::Arc;

use crate::Sentinel;
use crate::dispatcher::Dispatcher;
use crate::health::HealthCheckService;
use crate::rate_limit::RateLimiter;
use crate::storage::{HealthLog, JobRunLog, StorageBackend};

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Rate limiter for signup and verification flows
    pub limiter: RateLimiter,

    /// Tick coordinator
    pub dispatcher: Arc<Dispatcher>,

    /// Manual health check runs
    pub health_checks: Arc<HealthCheckService>,

    /// Health history for run lookups
    pub health_log: Arc<dyn HealthLog>,

    /// Where tick reports are appended after each tick
    pub job_log: Arc<dyn JobRunLog>,

    /// Backend handle for liveness reporting
    pub storage: Arc<dyn StorageBackend>,
}

impl ApiState {
    pub fn new(sentinel: Sentinel) -> Self {
        let Sentinel {
            limiter,
            dispatcher,
            health_checks,
            health_log,
            job_log,
            storage,
        } = sentinel;

        Self {
            limiter,
            dispatcher,
            health_checks,
            health_log,
            job_log,
            storage,
        }
    }
}

impl From<Sentinel> for ApiState {
    fn from(sentinel: Sentinel) -> Self {
        Self::new(sentinel)
    }
}
