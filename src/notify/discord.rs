//! Discord webhook notifications

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use super::report::BrokenLinksReport;
use super::{NotifyError, Notifier, REQUEST_TIMEOUT};

/// Discord limits embeds to 25 fields
const MAX_FIELDS: usize = 25;

/// Discord limits a field value to 1024 characters
const MAX_FIELD_VALUE: usize = 1024;

const COLOR_RED: u32 = 15158332;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Posts broken-link reports to a Discord webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    url: String,
    user_id: Option<String>,
    timeout: Duration,
}

impl DiscordNotifier {
    pub fn new(url: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            user_id,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the webhook request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One embed with a field per jurisdiction
    pub fn build_report_embed(&self, report: &BrokenLinksReport) -> Embed {
        let groups = report.by_jurisdiction();
        let group_count = groups.len();

        let mut fields: Vec<EmbedField> = groups
            .into_iter()
            .take(MAX_FIELDS)
            .map(|(jurisdiction, links)| {
                let lines: Vec<String> = links
                    .iter()
                    .map(|link| format!("• [{}]({}): {}", link.title, link.url, link.error))
                    .collect();
                EmbedField {
                    name: format!("📍 {} ({})", jurisdiction, links.len()),
                    value: truncate(&lines.join("\n"), MAX_FIELD_VALUE),
                    inline: false,
                }
            })
            .collect();

        if group_count > MAX_FIELDS {
            if let Some(last) = fields.last_mut() {
                last.name = format!("📍 … and {} more jurisdictions", group_count - MAX_FIELDS + 1);
                last.value = "See the email report for the full list".to_string();
            }
        }

        Embed {
            title: Some("🔗 Broken Regulatory Links".to_string()),
            description: Some(format!(
                "**{}** of {} links are unreachable",
                report.len(),
                report.total
            )),
            color: Some(COLOR_RED),
            fields,
            footer: Some(EmbedFooter {
                text: format!("Run: {}", report.run_id),
            }),
            timestamp: Some(report.checked_at.to_rfc3339()),
        }
    }

    pub fn build_message(&self, report: &BrokenLinksReport) -> Message {
        let mut builder = MessageBuilder::new().add_embed(self.build_report_embed(report));
        if let Some(user_id) = &self.user_id {
            builder = builder.content(format!("🔗 {} broken links <@{user_id}>", report.len()));
        }
        builder.build()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    #[instrument(skip_all, fields(links = report.len()))]
    async fn send_broken_links(&self, report: &BrokenLinksReport) -> Result<(), NotifyError> {
        let message = self.build_message(report);

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&message)
            .send()
            .await
            .map_err(NotifyError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Discord message failed with status: {}", status);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("successfully sent Discord message");
        Ok(())
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}
