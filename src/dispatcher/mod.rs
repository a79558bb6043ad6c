//! Tick-driven job dispatcher
//!
//! An external clock calls [`Dispatcher::tick`] roughly once per hour. Each
//! tick decides from `now` alone which configured jobs are due, runs the due
//! ones concurrently and reports on every configured job.
//!
//! ## Tick Flow
//!
//! ```text
//! tick(now)
//!   ├─ previous tick still running? → every job: triggered=false, skipped=true
//!   ├─ schedule not due             → triggered=false, "not scheduled ..."
//!   └─ due                          → tokio::spawn(run job)
//!                                        ├─ Ok(outcome)  → success=true
//!                                        ├─ Err(e)       → success=false, message=e
//!                                        ├─ panic        → success=false, "job panicked: ..."
//!                                        └─ tick deadline → aborted, "timed out"
//! ```
//!
//! The due jobs are coordinated by a spawned task that holds the overlap
//! flag, so a caller that stops waiting (a dropped HTTP request, a timeout)
//! cannot open the door to a second concurrent tick.
//!
//! Nothing is remembered between ticks. A missed tick means that hour's jobs
//! do not run; there is no catch-up. Persisting reports is the caller's job.

pub mod job;
pub mod jobs;
pub mod schedule;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, error, info, instrument, warn};

pub use job::{Job, JobContext, JobOutcome, JobRunReport};
pub use schedule::Schedule;

/// Default tick-level deadline
pub const DEFAULT_TICK_TIMEOUT: Duration = Duration::from_secs(300);

/// Message reported for every job when a tick overlaps a running one
pub const OVERLAP_MESSAGE: &str = "skipped: previous tick still running";

/// A job together with the schedule that gates it
#[derive(Clone)]
pub struct ScheduledJob {
    pub job: Arc<dyn Job>,
    pub schedule: Schedule,
}

impl ScheduledJob {
    pub fn new(job: Arc<dyn Job>, schedule: Schedule) -> Self {
        Self { job, schedule }
    }
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("name", &self.job.name())
            .field("schedule", &self.schedule)
            .finish()
    }
}

/// Aggregated result of one tick
///
/// Serialized in camelCase (`tickAt`, `executionTimeMs`); the embedded job
/// reports keep their own snake_case field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub tick_at: DateTime<Utc>,
    pub execution_time_ms: u64,

    /// True when the tick overlapped a running one and ran nothing
    #[serde(default)]
    pub skipped: bool,

    /// One report per configured job, in configuration order
    pub jobs: Vec<JobRunReport>,
}

impl TickReport {
    pub fn triggered_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.triggered).count()
    }

    pub fn failed_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.triggered && !j.success).count()
    }

    pub fn job(&self, name: &str) -> Option<&JobRunReport> {
        self.jobs.iter().find(|j| j.job_name == name)
    }
}

/// Releases the overlap flag when the tick's run completes
struct TickGuard(Arc<AtomicBool>);

impl TickGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard(Arc::clone(flag)))
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Slot {
    Done(JobRunReport),
    Running {
        name: String,
        started: Instant,
        handle: JoinHandle<JobRunReport>,
    },
}

/// Stateless coordinator of scheduled jobs
pub struct Dispatcher {
    jobs: Arc<[ScheduledJob]>,
    tick_timeout: Duration,
    running: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(jobs: Vec<ScheduledJob>, tick_timeout: Duration) -> Self {
        Self {
            jobs: jobs.into(),
            tick_timeout,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    pub fn tick_timeout(&self) -> Duration {
        self.tick_timeout
    }

    /// Whether a tick is currently in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run every job due at `now` and report on all configured jobs
    ///
    /// Never fails: job errors, panics and timeouts are reported in-band.
    ///
    /// The run itself is a spawned task that owns the overlap flag. Dropping
    /// the returned future does not end the tick early: the flag stays held
    /// until every due job has finished or hit the tick deadline.
    #[instrument(skip(self), fields(tick_at = %now))]
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let started = Instant::now();

        let Some(guard) = TickGuard::acquire(&self.running) else {
            warn!("previous tick still running, skipping all jobs");
            return TickReport {
                tick_at: now,
                execution_time_ms: elapsed_ms(started),
                skipped: true,
                jobs: self
                    .jobs
                    .iter()
                    .map(|s| JobRunReport::skipped(s.job.name(), OVERLAP_MESSAGE))
                    .collect(),
            };
        };

        let deadline = started + self.tick_timeout;
        let jobs = Arc::clone(&self.jobs);
        let run = tokio::spawn(
            async move {
                let _guard = guard;
                run_tick(&jobs, now, started, deadline).await
            }
            .instrument(Span::current()),
        );

        let report = match run.await {
            Ok(report) => report,
            Err(e) => {
                let message = describe_join_error(e);
                error!("tick coordinator failed: {}", message);
                TickReport {
                    tick_at: now,
                    execution_time_ms: elapsed_ms(started),
                    skipped: false,
                    jobs: self
                        .jobs
                        .iter()
                        .map(|s| {
                            JobRunReport::failed(s.job.name(), message.clone(), elapsed_ms(started))
                        })
                        .collect(),
                }
            }
        };

        info!(
            "tick complete in {}ms: {} triggered, {} failed",
            report.execution_time_ms,
            report.triggered_count(),
            report.failed_count()
        );

        report
    }
}

/// Start the due jobs and collect one report per configured job
async fn run_tick(
    scheduled_jobs: &[ScheduledJob],
    now: DateTime<Utc>,
    started: Instant,
    deadline: Instant,
) -> TickReport {
    let ctx = JobContext { tick_at: now };

    let slots: Vec<Slot> = scheduled_jobs
        .iter()
        .map(|scheduled| {
            let name = scheduled.job.name().to_string();

            if !scheduled.schedule.is_due(now) {
                debug!("{}: not due ({})", name, scheduled.schedule);
                return Slot::Done(JobRunReport::skipped(
                    name,
                    format!("not scheduled this tick (runs {})", scheduled.schedule),
                ));
            }

            debug!("{}: starting", name);
            let job = Arc::clone(&scheduled.job);
            let ctx = ctx.clone();
            Slot::Running {
                name,
                started: Instant::now(),
                handle: tokio::spawn(run_job(job, ctx)),
            }
        })
        .collect();

    let mut jobs = Vec::with_capacity(slots.len());
    for slot in slots {
        let report = match slot {
            Slot::Done(report) => report,
            Slot::Running {
                name,
                started,
                mut handle,
            } => match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => {
                    let message = describe_join_error(e);
                    error!("{}: {}", name, message);
                    JobRunReport::failed(name, message, elapsed_ms(started))
                }
                Err(_) => {
                    handle.abort();
                    warn!("{}: aborted at tick deadline", name);
                    JobRunReport::failed(name, "timed out", elapsed_ms(started))
                }
            },
        };
        jobs.push(report);
    }

    TickReport {
        tick_at: now,
        execution_time_ms: elapsed_ms(started),
        skipped: false,
        jobs,
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("jobs", &self.jobs)
            .field("tick_timeout", &self.tick_timeout)
            .finish_non_exhaustive()
    }
}

/// Run one job, turning its error into a failed report
async fn run_job(job: Arc<dyn Job>, ctx: JobContext) -> JobRunReport {
    let started = Instant::now();
    let result = job.run(&ctx).await;
    let duration_ms = elapsed_ms(started);

    match result {
        Ok(outcome) => {
            info!(
                "{}: succeeded in {}ms ({} records)",
                job.name(),
                duration_ms,
                outcome.records_affected
            );
            JobRunReport::succeeded(job.name(), outcome, duration_ms)
        }
        Err(e) => {
            error!("{}: failed after {}ms: {:#}", job.name(), duration_ms, e);
            JobRunReport::failed(job.name(), format!("{e:#}"), duration_ms)
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "job cancelled".to_string();
    }

    let payload = err.into_panic();
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    format!("job panicked: {reason}")
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
