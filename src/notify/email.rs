//! Alert emails through an external email-sending service

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use super::report::{BrokenLink, BrokenLinksReport};
use super::{NotifyError, Notifier, REQUEST_TIMEOUT};

/// Request body accepted by the email service
#[derive(Debug, Serialize)]
pub struct EmailPayload<'a> {
    pub to: &'a [String],
    pub subject: String,
    pub broken_links: &'a [BrokenLink],

    /// Plain-text body grouped by jurisdiction
    pub report: String,
}

/// Sends broken-link reports as email through an HTTP email service
#[derive(Debug, Clone)]
pub struct EmailServiceNotifier {
    client: Client,
    url: String,
    token: Option<String>,
    recipients: Vec<String>,
}

impl EmailServiceNotifier {
    pub fn new(url: impl Into<String>, token: Option<String>, recipients: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            token,
            recipients,
        }
    }

    pub fn build_payload<'a>(&'a self, report: &'a BrokenLinksReport) -> EmailPayload<'a> {
        EmailPayload {
            to: &self.recipients,
            subject: report.subject(),
            broken_links: &report.links,
            report: report.render_text(),
        }
    }
}

#[async_trait]
impl Notifier for EmailServiceNotifier {
    #[instrument(skip_all, fields(links = report.len(), recipients = self.recipients.len()))]
    async fn send_broken_links(&self, report: &BrokenLinksReport) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(&self.build_payload(report));

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(NotifyError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("email service rejected alert with status: {}", status);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("broken link alert handed to email service");
        Ok(())
    }
}
