//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use compliance_sentinel::{
    config::Config,
    notify::{BrokenLinksReport, Notifier, NotifyError},
    prober::{ProbeCategory, ProbeOptions, ProbeTarget, Prober},
};
use tokio::sync::Mutex;

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn target(url: impl Into<String>, owner_tag: &str) -> ProbeTarget {
    ProbeTarget::new(url, ProbeCategory::RegulationPage, owner_tag)
}

pub fn test_prober(concurrency: usize, timeout: Duration, outer_deadline: Option<Duration>) -> Prober {
    Prober::new(ProbeOptions {
        concurrency,
        per_request_timeout: timeout,
        outer_deadline,
        user_agent: "sentinel-tests/1.0".to_string(),
    })
    .unwrap()
}

pub fn config_from_json(json: serde_json::Value) -> Config {
    serde_json::from_value(json).unwrap()
}

/// Notifier that keeps every report it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub reports: Mutex<Vec<BrokenLinksReport>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn sent(&self) -> Vec<BrokenLinksReport> {
        self.reports.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_broken_links(&self, report: &BrokenLinksReport) -> Result<(), NotifyError> {
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}

/// A local address nothing is listening on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}
