//! Broken-link report handed to notifiers

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::HealthCheckRecord;

/// One unreachable URL as presented to humans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub title: String,
    pub url: String,
    pub jurisdiction: String,
    pub error: String,
}

impl BrokenLink {
    fn from_record(record: &HealthCheckRecord) -> Self {
        Self {
            title: record.title.clone().unwrap_or_else(|| record.url.clone()),
            url: record.url.clone(),
            jurisdiction: record.owner_tag.clone(),
            error: record
                .failure_reason()
                .unwrap_or_else(|| "unreachable".to_string()),
        }
    }
}

/// Every broken link of one health check run
///
/// Links are sorted by jurisdiction, then URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLinksReport {
    pub run_id: String,
    pub checked_at: DateTime<Utc>,

    /// Number of targets checked in the run
    pub total: usize,
    pub links: Vec<BrokenLink>,
}

impl BrokenLinksReport {
    /// Build the report from a run's records, keeping only unreachable ones
    pub fn from_records(
        run_id: impl Into<String>,
        checked_at: DateTime<Utc>,
        total: usize,
        records: &[HealthCheckRecord],
    ) -> Self {
        let mut links: Vec<BrokenLink> = records
            .iter()
            .filter(|r| !r.reachable)
            .map(BrokenLink::from_record)
            .collect();
        links.sort_by(|a, b| {
            a.jurisdiction
                .cmp(&b.jurisdiction)
                .then_with(|| a.url.cmp(&b.url))
        });

        Self {
            run_id: run_id.into(),
            checked_at,
            total,
            links,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links grouped by jurisdiction, jurisdictions in alphabetical order
    pub fn by_jurisdiction(&self) -> BTreeMap<&str, Vec<&BrokenLink>> {
        let mut groups: BTreeMap<&str, Vec<&BrokenLink>> = BTreeMap::new();
        for link in &self.links {
            groups.entry(link.jurisdiction.as_str()).or_default().push(link);
        }
        groups
    }

    /// Subject line for alert emails
    pub fn subject(&self) -> String {
        match self.len() {
            1 => "Compliance Sentinel: 1 broken regulatory link".to_string(),
            n => format!("Compliance Sentinel: {n} broken regulatory links"),
        }
    }

    /// Plain-text rendering grouped by jurisdiction
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} of {} links were unreachable during run {} ({}).",
            self.len(),
            self.total,
            self.run_id,
            self.checked_at.format("%Y-%m-%d %H:%M UTC")
        );

        for (jurisdiction, links) in self.by_jurisdiction() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{} ({})", jurisdiction, links.len());
            for link in links {
                let _ = writeln!(out, "  - {}", link.title);
                let _ = writeln!(out, "    {}", link.url);
                let _ = writeln!(out, "    error: {}", link.error);
            }
        }

        out
    }
}
