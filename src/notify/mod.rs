//! Outbound alerting for broken links
//!
//! The health aggregator hands a [`BrokenLinksReport`] to a [`Notifier`] and
//! stops there. Delivery is attempted once; failures come back as
//! [`NotifyError`] for the caller to log.

pub mod discord;
pub mod email;
pub mod report;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::NotificationConfig;

pub use discord::DiscordNotifier;
pub use email::EmailServiceNotifier;
pub use report::{BrokenLink, BrokenLinksReport};

/// Deadline for a single outbound notification request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors that can occur while delivering a notification
#[derive(Debug)]
pub enum NotifyError {
    /// The request could not be sent
    Request(reqwest::Error),

    /// No response arrived before the request deadline
    Timeout,

    /// The receiving service answered with a non-success status
    Rejected { status: u16, body: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Request(err) => write!(f, "notification request failed: {}", err),
            NotifyError::Timeout => write!(f, "notification request timed out"),
            NotifyError::Rejected { status, body } if body.is_empty() => {
                write!(f, "notification rejected with HTTP {}", status)
            }
            NotifyError::Rejected { status, body } => {
                write!(f, "notification rejected with HTTP {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::Request(err) => Some(err),
            NotifyError::Timeout | NotifyError::Rejected { .. } => None,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotifyError::Timeout
        } else {
            NotifyError::Request(err)
        }
    }
}

/// Alert channel for broken links
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_broken_links(&self, report: &BrokenLinksReport) -> Result<(), NotifyError>;
}

/// Writes the report to the log; used when no channel is configured
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_broken_links(&self, report: &BrokenLinksReport) -> Result<(), NotifyError> {
        for (jurisdiction, links) in report.by_jurisdiction() {
            for link in links {
                warn!("[{}] broken link {} ({})", jurisdiction, link.url, link.error);
            }
        }
        Ok(())
    }
}

/// Build the notifier described by the configuration
pub fn from_config(config: Option<&NotificationConfig>) -> Arc<dyn Notifier> {
    match config {
        Some(NotificationConfig::EmailService(email)) => Arc::new(EmailServiceNotifier::new(
            email.url.clone(),
            email.token.clone(),
            email.recipients.clone(),
        )),
        Some(NotificationConfig::Discord(discord)) => Arc::new(DiscordNotifier::new(
            discord.url.clone(),
            discord.user_id.clone(),
        )),
        None => Arc::new(LogNotifier),
    }
}
