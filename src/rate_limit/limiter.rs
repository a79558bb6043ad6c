//! Rate limiter front end: input validation, limit lookup, store access

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::error::RateLimitError;
use super::types::{Action, ActionLimits, Decision, RateLimitWindow};
use crate::storage::RateLimitStore;

/// Longest accepted subject (the maximum length of an email address)
pub const MAX_SUBJECT_LEN: usize = 320;

/// Printable, whitespace-free identifiers: IPs, emails, user ids
static SUBJECT_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[^\s\p{Cc}]+$"));

/// Validate and normalize a subject
///
/// Leading/trailing whitespace is trimmed. Subjects containing `@` are
/// treated as email addresses and lowercased so that case variants share a
/// window.
pub fn normalize_subject(subject: &str) -> Result<String, RateLimitError> {
    let trimmed = subject.trim();

    if trimmed.is_empty() {
        return Err(RateLimitError::InvalidSubject(
            "subject must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_SUBJECT_LEN {
        return Err(RateLimitError::InvalidSubject(format!(
            "subject longer than {MAX_SUBJECT_LEN} characters"
        )));
    }
    match SUBJECT_PATTERN.as_ref() {
        Ok(pattern) if pattern.is_match(trimmed) => {}
        Ok(_) => {
            return Err(RateLimitError::InvalidSubject(
                "subject must not contain whitespace or control characters".to_string(),
            ));
        }
        Err(e) => {
            return Err(RateLimitError::InvalidSubject(format!(
                "subject pattern unavailable: {e}"
            )));
        }
    }

    if trimmed.contains('@') {
        Ok(trimmed.to_lowercase())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Fixed-window attempt limiter over a shared window store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limits: HashMap<Action, ActionLimits>,
}

impl RateLimiter {
    /// Limiter using each action's built-in limits
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self::with_limits(store, HashMap::new())
    }

    /// Limiter with configured overrides; actions missing from `limits` keep
    /// their built-in defaults
    pub fn with_limits(
        store: Arc<dyn RateLimitStore>,
        limits: HashMap<Action, ActionLimits>,
    ) -> Self {
        let limits = Action::ALL
            .into_iter()
            .map(|action| {
                let configured = limits.get(&action).copied();
                (action, configured.unwrap_or_else(|| action.default_limits()))
            })
            .collect();

        Self { store, limits }
    }

    /// Limits currently applied to an action
    pub fn limits_for(&self, action: Action) -> ActionLimits {
        self.limits
            .get(&action)
            .copied()
            .unwrap_or_else(|| action.default_limits())
    }

    /// Check whether an attempt is allowed and record it if so
    ///
    /// A denied attempt leaves the window untouched. Store failures are
    /// returned as errors and never turn into an allowed decision.
    pub async fn check_and_record(
        &self,
        subject: &str,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<Decision, RateLimitError> {
        let limits = self.limits_for(action);
        self.check_and_record_with(subject, action, &limits, now)
            .await
    }

    /// Same as [`Self::check_and_record`] with explicit limits
    #[instrument(skip(self, subject, limits), fields(action = %action))]
    pub async fn check_and_record_with(
        &self,
        subject: &str,
        action: Action,
        limits: &ActionLimits,
        now: DateTime<Utc>,
    ) -> Result<Decision, RateLimitError> {
        let subject = normalize_subject(subject)?;

        let outcome = self
            .store
            .record_attempt(&subject, action, limits, now)
            .await
            .map_err(|e| {
                warn!(
                    transient = e.is_transient(),
                    "failing closed, window store error: {}",
                    e
                );
                RateLimitError::Storage(e)
            })?;

        let decision = outcome.into_decision(now);
        match &decision {
            Decision::Allowed { attempt_count, .. } => {
                debug!(
                    "attempt {}/{} allowed",
                    attempt_count, limits.max_attempts
                );
            }
            Decision::Denied { .. } => {
                info!(
                    "{} denied, retry in {} minutes",
                    action,
                    decision.retry_after_minutes().unwrap_or(1)
                );
            }
        }

        Ok(decision)
    }

    /// Parse a wire action name, then check and record
    ///
    /// Unknown actions are rejected before the store is touched.
    pub async fn check_and_record_str(
        &self,
        subject: &str,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<(Action, Decision), RateLimitError> {
        let action: Action = action.parse()?;
        let decision = self.check_and_record(subject, action, now).await?;
        Ok((action, decision))
    }

    /// Current window for a subject and action, if one is stored
    pub async fn window(
        &self,
        subject: &str,
        action: Action,
    ) -> Result<Option<RateLimitWindow>, RateLimitError> {
        let subject = normalize_subject(subject)?;
        Ok(self.store.get_window(&subject, action).await?)
    }

    /// Delete every window for a subject (admin reset)
    #[instrument(skip(self, subject))]
    pub async fn clear_subject(&self, subject: &str) -> Result<usize, RateLimitError> {
        let subject = normalize_subject(subject)?;
        let cleared = self.store.clear_subject(&subject).await?;
        info!("cleared {} windows", cleared);
        Ok(cleared)
    }

    /// Remove windows that have expired by `now`
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RateLimitError> {
        Ok(self.store.purge_expired_windows(now).await?)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
