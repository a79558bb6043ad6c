//! Bounded-concurrency URL reachability checks
//!
//! The prober walks a list of third-party URLs and classifies each one as
//! reachable or not. It replaces ad-hoc "test every link" scripts with one
//! parameterized component.
//!
//! ## Probe Flow
//!
//! ```text
//! targets → distinct URLs → buffer_unordered(concurrency) → HEAD ──ok──→ classify
//!                                                              │
//!                                                    status >= 400
//!                                                              ↓
//!                                                             GET ────→ classify
//! ```
//!
//! - Each request carries its own timeout; a slow target only occupies one
//!   slot of the pool and never delays its siblings.
//! - No retries: a retry policy belongs to the caller.
//! - Each distinct URL is requested once. The batch holds one result per
//!   target, in target order, so targets sharing a URL share its result.
//! - An optional outer deadline truncates the run; the batch then reports how
//!   many targets produced no result instead of failing.

pub mod types;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use reqwest::{Method, Url};
use tracing::{debug, instrument, trace, warn};

pub use types::{ProbeBatch, ProbeCategory, ProbeErrorKind, ProbeResult, ProbeTarget};

/// Default number of probes in flight
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Prober tuning knobs
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Maximum number of probes in flight at once
    pub concurrency: usize,

    /// Deadline applied to every individual request
    pub per_request_timeout: Duration,

    /// Deadline for the whole batch (None = wait for every probe)
    pub outer_deadline: Option<Duration>,

    /// User-Agent header sent with every probe
    pub user_agent: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            per_request_timeout: DEFAULT_TIMEOUT,
            outer_deadline: None,
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("compliance-sentinel/{}", env!("CARGO_PKG_VERSION"))
}

/// Reachability checker shared by the health aggregator and the probe CLI
#[derive(Debug, Clone)]
pub struct Prober {
    /// HTTP client (reused across requests for connection pooling)
    client: reqwest::Client,
    options: ProbeOptions,
}

impl Prober {
    pub fn new(options: ProbeOptions) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .connect_timeout(options.per_request_timeout)
            .build()?;

        Ok(Self { client, options })
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    /// Probe every target with at most `concurrency` requests in flight
    ///
    /// Targets sharing a URL are probed once and each receive the shared
    /// result. Never fails: transport problems
    /// are recorded in the individual results, and an elapsed outer deadline
    /// is reported through `not_attempted`.
    #[instrument(skip_all, fields(targets = targets.len(), concurrency = self.options.concurrency))]
    pub async fn probe_all(&self, targets: &[ProbeTarget]) -> ProbeBatch {
        let mut seen = HashSet::new();
        let urls: Vec<String> = targets
            .iter()
            .filter(|t| seen.insert(t.url.as_str()))
            .map(|t| t.url.clone())
            .collect();

        let distinct = urls.len();
        if distinct < targets.len() {
            debug!(
                "{} targets share {} distinct URLs",
                targets.len(),
                distinct
            );
        }

        let probes = stream::iter(urls)
            .map(|url| async move { self.probe_url(&url).await })
            .buffer_unordered(self.options.concurrency.max(1));

        let completed: Vec<ProbeResult> = match self.options.outer_deadline {
            Some(deadline) => {
                probes
                    .take_until(tokio::time::sleep(deadline))
                    .collect()
                    .await
            }
            None => probes.collect().await,
        };

        if completed.len() < distinct {
            warn!(
                "outer deadline elapsed with {} of {} URLs unfinished",
                distinct - completed.len(),
                distinct
            );
        }

        // One result per target, in target order
        let by_url: HashMap<&str, &ProbeResult> = completed
            .iter()
            .map(|result| (result.url.as_str(), result))
            .collect();

        let mut results = Vec::with_capacity(targets.len());
        let mut not_attempted = 0;
        for target in targets {
            match by_url.get(target.url.as_str()) {
                Some(result) => results.push((*result).clone()),
                None => not_attempted += 1,
            }
        }

        let batch = ProbeBatch {
            results,
            not_attempted,
        };
        debug!(
            "probe run complete: {} reachable, {} unreachable",
            batch.reachable_count(),
            batch.unreachable_count()
        );
        batch
    }

    /// Probe a single target
    pub async fn probe_one(&self, target: &ProbeTarget) -> ProbeResult {
        self.probe_url(&target.url).await
    }

    async fn probe_url(&self, url: &str) -> ProbeResult {
        let parsed = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            Ok(parsed) => {
                return ProbeResult::from_error(
                    url,
                    ProbeErrorKind::Protocol,
                    format!("unsupported scheme: {}", parsed.scheme()),
                    0,
                );
            }
            Err(e) => {
                return ProbeResult::from_error(
                    url,
                    ProbeErrorKind::Protocol,
                    format!("invalid URL: {e}"),
                    0,
                );
            }
        };

        let start = Instant::now();

        let outcome = match self.send(Method::HEAD, parsed.clone()).await {
            // Plenty of servers answer HEAD with 403/405/501 while serving GET fine
            Ok(status) if status >= 400 => {
                trace!("{url}: HEAD returned {status}, retrying with GET");
                self.send(Method::GET, parsed).await
            }
            other => other,
        };

        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(status) => {
                trace!("{url}: {status} in {latency_ms}ms");
                ProbeResult::from_status(url, status, latency_ms)
            }
            Err(e) => {
                let kind = classify_error(&e);
                debug!("{url}: probe failed ({kind}): {e}");
                ProbeResult::from_error(url, kind, e.to_string(), latency_ms)
            }
        }
    }

    async fn send(&self, method: Method, url: Url) -> reqwest::Result<u16> {
        let response = self
            .client
            .request(method, url)
            .timeout(self.options.per_request_timeout)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}

/// Map a transport error onto a probe error kind
fn classify_error(err: &reqwest::Error) -> ProbeErrorKind {
    if err.is_timeout() {
        return ProbeErrorKind::Timeout;
    }
    if err.is_connect() {
        return ProbeErrorKind::Connection;
    }
    if err.is_redirect() || err.is_decode() || err.is_body() || err.is_builder() {
        return ProbeErrorKind::Protocol;
    }

    // Anything else: an I/O error somewhere in the chain means the socket
    // went away, otherwise the peer sent something we could not parse.
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if inner.downcast_ref::<std::io::Error>().is_some() {
            return ProbeErrorKind::Connection;
        }
        source = inner.source();
    }

    ProbeErrorKind::Protocol
}
