//! Probe targets and results

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What kind of page a target URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    NewsPage,
    RegulationPage,
    AgencyRoot,
}

impl ProbeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeCategory::NewsPage => "news_page",
            ProbeCategory::RegulationPage => "regulation_page",
            ProbeCategory::AgencyRoot => "agency_root",
        }
    }
}

impl std::fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "news_page" => Ok(ProbeCategory::NewsPage),
            "regulation_page" => Ok(ProbeCategory::RegulationPage),
            "agency_root" => Ok(ProbeCategory::AgencyRoot),
            other => Err(format!("unknown probe category: {other}")),
        }
    }
}

/// A URL to check, with the metadata needed for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub url: String,
    pub category: ProbeCategory,

    /// Owning jurisdiction (e.g. "CA", "US-FED")
    pub owner_tag: String,

    /// Agency or page title, used in alert reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ProbeTarget {
    pub fn new(url: impl Into<String>, category: ProbeCategory, owner_tag: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category,
            owner_tag: owner_tag.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title if known, otherwise the URL
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

/// Why a probe did not produce a usable response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// The per-request deadline elapsed
    Timeout,
    /// Socket or DNS failure
    Connection,
    /// Malformed response, redirect loop or invalid URL
    Protocol,
    /// A response was received (its status may still be a failure)
    None,
}

impl ProbeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::Connection => "connection",
            ProbeErrorKind::Protocol => "protocol",
            ProbeErrorKind::None => "none",
        }
    }
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(ProbeErrorKind::Timeout),
            "connection" => Ok(ProbeErrorKind::Connection),
            "protocol" => Ok(ProbeErrorKind::Protocol),
            "none" => Ok(ProbeErrorKind::None),
            other => Err(format!("unknown probe error kind: {other}")),
        }
    }
}

/// Outcome of probing one target
///
/// Produced once per target per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub reachable: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub error_kind: ProbeErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProbeResult {
    /// Classify an HTTP status: anything in 200..=399 is reachable
    pub fn from_status(url: &str, status_code: u16, latency_ms: u64) -> Self {
        let reachable = is_reachable_status(status_code);
        Self {
            url: url.to_string(),
            reachable,
            status_code: Some(status_code),
            latency_ms,
            error_kind: ProbeErrorKind::None,
            error_message: if reachable {
                None
            } else {
                Some(format!("HTTP {status_code}"))
            },
        }
    }

    pub fn from_error(
        url: &str,
        error_kind: ProbeErrorKind,
        message: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            url: url.to_string(),
            reachable: false,
            status_code: None,
            latency_ms,
            error_kind,
            error_message: Some(message.into()),
        }
    }

    /// Short description of the failure for reports
    pub fn failure_reason(&self) -> Option<String> {
        describe_failure(
            self.reachable,
            self.error_kind,
            self.status_code,
            self.error_message.as_deref(),
        )
    }
}

pub(crate) fn describe_failure(
    reachable: bool,
    error_kind: ProbeErrorKind,
    status_code: Option<u16>,
    error_message: Option<&str>,
) -> Option<String> {
    if reachable {
        return None;
    }

    Some(match (error_kind, status_code) {
        (ProbeErrorKind::None, Some(code)) => format!("HTTP {code}"),
        (ProbeErrorKind::Timeout, _) => "timeout".to_string(),
        (kind, _) => match error_message {
            Some(message) => format!("{kind}: {message}"),
            None => kind.to_string(),
        },
    })
}

pub fn is_reachable_status(status_code: u16) -> bool {
    (200..=399).contains(&status_code)
}

/// Results of one `probe_all` call
#[derive(Debug, Clone, Default)]
pub struct ProbeBatch {
    /// One result per finished target, in target order
    pub results: Vec<ProbeResult>,

    /// Targets with no result because the outer deadline elapsed first
    pub not_attempted: usize,
}

impl ProbeBatch {
    pub fn reachable_count(&self) -> usize {
        self.results.iter().filter(|r| r.reachable).count()
    }

    pub fn unreachable_count(&self) -> usize {
        self.results.len() - self.reachable_count()
    }

    pub fn is_truncated(&self) -> bool {
        self.not_attempted > 0
    }
}
