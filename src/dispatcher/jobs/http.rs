//! Job that triggers work in another service over HTTP

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::dispatcher::{Job, JobContext, JobOutcome};

/// Response fields checked, in order, for a processed-record count
const COUNT_FIELDS: [&str; 3] = ["records_affected", "processed", "count"];

/// Longest response body quoted in an error message
const MAX_ERROR_BODY: usize = 200;

/// POSTs to a URL and treats any 2xx as success
#[derive(Debug, Clone)]
pub struct HttpJob {
    name: String,
    client: Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpJob {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            url: url.into(),
            token: None,
            timeout,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[async_trait]
impl Job for HttpJob {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(job = %self.name, url = %self.url))]
    async fn run(&self, ctx: &JobContext) -> anyhow::Result<JobOutcome> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&json!({
                "job": self.name,
                "tick_at": ctx.tick_at.to_rfc3339(),
            }));

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!("{} answered {}", self.url, status);

        if !status.is_success() {
            let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
            if excerpt.is_empty() {
                anyhow::bail!("HTTP {}", status.as_u16());
            }
            anyhow::bail!("HTTP {}: {}", status.as_u16(), excerpt);
        }

        Ok(parse_outcome(status.as_u16(), &body))
    }
}

/// Pull a message and record count out of a JSON body, if there is one
fn parse_outcome(status: u16, body: &str) -> JobOutcome {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return JobOutcome::new(format!("HTTP {status}"), 0);
    };

    let records = COUNT_FIELDS
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_u64))
        .unwrap_or(0);

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"));

    JobOutcome::new(message, records)
}
