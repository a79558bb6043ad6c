//! Rate limit domain types

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::RateLimitError;

/// Action protected by the rate limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Signup,
    EmailVerification,
    PasswordReset,
    Login,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Signup,
        Action::EmailVerification,
        Action::PasswordReset,
        Action::Login,
    ];

    /// Get the string representation (snake_case)
    ///
    /// This matches the serde serialization format and the value stored in
    /// the `action` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Signup => "signup",
            Action::EmailVerification => "email_verification",
            Action::PasswordReset => "password_reset",
            Action::Login => "login",
        }
    }

    /// Limits applied when the configuration does not override them
    pub fn default_limits(&self) -> ActionLimits {
        match self {
            Action::Signup => ActionLimits::from_minutes(3, 60),
            Action::EmailVerification => ActionLimits::from_minutes(5, 60),
            Action::PasswordReset => ActionLimits::from_minutes(3, 60),
            Action::Login => ActionLimits::from_minutes(10, 15),
        }
    }

    /// Human-readable noun phrase used in denial messages
    pub fn describe(&self) -> &'static str {
        match self {
            Action::Signup => "signup attempts",
            Action::EmailVerification => "verification emails",
            Action::PasswordReset => "password reset requests",
            Action::Login => "login attempts",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| RateLimitError::InvalidAction(s.to_string()))
    }
}

/// Maximum attempts allowed within one window for an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionLimits {
    pub max_attempts: u32,
    pub window: Duration,
}

impl ActionLimits {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    pub fn from_minutes(max_attempts: u32, window_minutes: i64) -> Self {
        Self::new(max_attempts, Duration::minutes(window_minutes))
    }
}

/// The live counting window for one `(subject, action)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    pub subject: String,
    pub action: Action,
    pub attempt_count: u32,
    pub window_reset_at: DateTime<Utc>,
}

impl RateLimitWindow {
    fn fresh(subject: &str, action: Action, limits: &ActionLimits, now: DateTime<Utc>) -> Self {
        Self {
            subject: subject.to_string(),
            action,
            attempt_count: 1,
            window_reset_at: now + limits.window,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_reset_at
    }

    /// Apply one attempt to the current window (if any)
    ///
    /// Pure transition function; stores call it while holding the key's lock
    /// and persist the returned window unless the outcome is `Rejected`.
    pub fn apply_attempt(
        existing: Option<&RateLimitWindow>,
        subject: &str,
        action: Action,
        limits: &ActionLimits,
        now: DateTime<Utc>,
    ) -> AttemptOutcome {
        match existing {
            None => AttemptOutcome::Created(Self::fresh(subject, action, limits, now)),
            Some(window) if window.is_expired(now) => {
                AttemptOutcome::Reset(Self::fresh(subject, action, limits, now))
            }
            Some(window) if window.attempt_count < limits.max_attempts => {
                let mut window = window.clone();
                window.attempt_count += 1;
                AttemptOutcome::Incremented(window)
            }
            Some(window) => AttemptOutcome::Rejected(window.clone()),
        }
    }
}

/// Result of applying one attempt to a window
///
/// Every variant except `Rejected` corresponds to exactly one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Created(RateLimitWindow),
    Reset(RateLimitWindow),
    Incremented(RateLimitWindow),
    Rejected(RateLimitWindow),
}

impl AttemptOutcome {
    pub fn window(&self) -> &RateLimitWindow {
        match self {
            AttemptOutcome::Created(w)
            | AttemptOutcome::Reset(w)
            | AttemptOutcome::Incremented(w)
            | AttemptOutcome::Rejected(w) => w,
        }
    }

    pub fn into_decision(self, now: DateTime<Utc>) -> Decision {
        match self {
            AttemptOutcome::Rejected(window) => Decision::Denied {
                retry_after: window.window_reset_at - now,
                window_reset_at: window.window_reset_at,
            },
            AttemptOutcome::Created(window)
            | AttemptOutcome::Reset(window)
            | AttemptOutcome::Incremented(window) => Decision::Allowed {
                attempt_count: window.attempt_count,
                window_reset_at: window.window_reset_at,
            },
        }
    }
}

/// Answer to "may this subject perform this action now?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        attempt_count: u32,
        window_reset_at: DateTime<Utc>,
    },
    Denied {
        retry_after: Duration,
        window_reset_at: DateTime<Utc>,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Wait time in whole minutes, rounded up (never below one minute)
    pub fn retry_after_minutes(&self) -> Option<i64> {
        match self {
            Decision::Allowed { .. } => None,
            Decision::Denied { retry_after, .. } => {
                let secs = retry_after.num_seconds().max(0);
                Some(((secs + 59) / 60).max(1))
            }
        }
    }

    /// Message suitable for showing to the end user
    pub fn message(&self, action: Action) -> String {
        match self.retry_after_minutes() {
            None => "Request allowed".to_string(),
            Some(1) => format!(
                "Too many {}. Please try again in 1 minute.",
                action.describe()
            ),
            Some(minutes) => format!(
                "Too many {}. Please try again in {} minutes.",
                action.describe(),
                minutes
            ),
        }
    }
}
