use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use compliance_sentinel::{
    health::{FileTargetSource, TargetSource},
    prober::{self, ProbeCategory, ProbeOptions, ProbeResult, ProbeTarget, Prober},
};
use tracing::{level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Check a list of URLs for reachability
#[derive(Debug, Clone, Parser)]
struct Args {
    /// JSON array of targets
    #[arg(short, long)]
    targets: Option<PathBuf>,

    /// Extra URLs to check (repeatable)
    #[arg(short, long = "url")]
    urls: Vec<String>,

    /// Probes in flight at once
    #[arg(short, long, default_value_t = prober::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = prober::DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Deadline for the whole run in seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Only print unreachable URLs
    #[arg(long)]
    broken_only: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log verbosely to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("compliance_sentinel", level),
        ("probe", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let mut targets = match &args.targets {
        Some(path) => FileTargetSource::new(path).load().await?,
        None => Vec::new(),
    };
    targets.extend(
        args.urls
            .iter()
            .map(|url| ProbeTarget::new(url, ProbeCategory::AgencyRoot, "cli")),
    );

    if targets.is_empty() {
        anyhow::bail!("nothing to check: pass --targets <file> or --url <url>");
    }

    let prober = Prober::new(ProbeOptions {
        concurrency: args.concurrency,
        per_request_timeout: Duration::from_secs(args.timeout_secs),
        outer_deadline: args.deadline_secs.map(Duration::from_secs),
        user_agent: prober::default_user_agent(),
    })?;

    let mut batch = prober.probe_all(&targets).await;
    batch.results.sort_by(|a, b| a.url.cmp(&b.url));

    let shown: Vec<&ProbeResult> = batch
        .results
        .iter()
        .filter(|r| !args.broken_only || !r.reachable)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        for result in &shown {
            let status = result
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "---".to_string());
            let mark = if result.reachable { "ok " } else { "BAD" };
            let reason = result.failure_reason().unwrap_or_default();
            println!(
                "{mark} {status} {:>6}ms {} {reason}",
                result.latency_ms, result.url
            );
        }
        println!(
            "\n{} checked, {} reachable, {} unreachable, {} not attempted",
            batch.results.len() + batch.not_attempted,
            batch.reachable_count(),
            batch.unreachable_count(),
            batch.not_attempted
        );
    }

    if batch.unreachable_count() > 0 || batch.is_truncated() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
