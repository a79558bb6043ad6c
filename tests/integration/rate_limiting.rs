//! Integration tests for the rate limiter over the in-memory store
//!
//! These tests verify that:
//! - Concurrent attempts never admit more than the configured maximum
//! - Subjects and actions have independent windows
//! - Expired windows are purged and start fresh

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use compliance_sentinel::{
    rate_limit::{Action, ActionLimits, Decision, RateLimiter},
    storage::MemoryBackend,
};
use futures::future::join_all;

use crate::helpers::at;

fn limiter() -> RateLimiter {
    RateLimiter::new(Arc::new(MemoryBackend::new()))
}

#[tokio::test]
async fn test_concurrent_logins_admit_exactly_max() {
    let limiter = limiter();
    let now = at("2025-03-10T12:00:00Z");

    let attempts = (0..50).map(|_| {
        let limiter = limiter.clone();
        tokio::spawn(async move {
            limiter
                .check_and_record("203.0.113.7", Action::Login, now)
                .await
                .unwrap()
        })
    });

    let decisions: Vec<Decision> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let allowed = decisions.iter().filter(|d| d.is_allowed()).count();
    assert_eq!(allowed, 10);

    let window = limiter
        .window("203.0.113.7", Action::Login)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(window.attempt_count, 10);
}

#[tokio::test]
async fn test_subjects_and_actions_are_independent() {
    let limiter = limiter();
    let now = at("2025-03-10T12:00:00Z");

    for _ in 0..3 {
        assert!(
            limiter
                .check_and_record("ana@agency.gov", Action::PasswordReset, now)
                .await
                .unwrap()
                .is_allowed()
        );
    }

    let denied = limiter
        .check_and_record("ana@agency.gov", Action::PasswordReset, now)
        .await
        .unwrap();
    assert!(!denied.is_allowed());

    // Same subject, other action
    assert!(
        limiter
            .check_and_record("ana@agency.gov", Action::EmailVerification, now)
            .await
            .unwrap()
            .is_allowed()
    );

    // Other subject, same action
    assert!(
        limiter
            .check_and_record("ben@agency.gov", Action::PasswordReset, now)
            .await
            .unwrap()
            .is_allowed()
    );
}

#[tokio::test]
async fn test_denial_message_counts_down() {
    let mut limits = HashMap::new();
    limits.insert(Action::Signup, ActionLimits::from_minutes(1, 10));
    let limiter = RateLimiter::with_limits(Arc::new(MemoryBackend::new()), limits);
    let start = at("2025-03-10T12:00:00Z");

    limiter
        .check_and_record("198.51.100.2", Action::Signup, start)
        .await
        .unwrap();

    let early = limiter
        .check_and_record("198.51.100.2", Action::Signup, start + Duration::seconds(30))
        .await
        .unwrap();
    assert_eq!(early.retry_after_minutes(), Some(10));
    assert_eq!(
        early.message(Action::Signup),
        "Too many signup attempts. Please try again in 10 minutes."
    );

    let late = limiter
        .check_and_record("198.51.100.2", Action::Signup, start + Duration::seconds(570))
        .await
        .unwrap();
    assert_eq!(late.retry_after_minutes(), Some(1));
    assert_eq!(
        late.message(Action::Signup),
        "Too many signup attempts. Please try again in 1 minute."
    );
}

#[tokio::test]
async fn test_purge_then_fresh_window() {
    let limiter = limiter();
    let start = at("2025-03-10T12:00:00Z");

    for subject in ["a@x.gov", "b@x.gov", "c@x.gov"] {
        limiter
            .check_and_record(subject, Action::Login, start)
            .await
            .unwrap();
    }

    // Login windows last 15 minutes
    let purged = limiter
        .purge_expired(start + Duration::minutes(16))
        .await
        .unwrap();
    assert_eq!(purged, 3);
    assert!(limiter.window("a@x.gov", Action::Login).await.unwrap().is_none());

    let decision = limiter
        .check_and_record("a@x.gov", Action::Login, start + Duration::minutes(16))
        .await
        .unwrap();
    assert!(matches!(
        decision,
        Decision::Allowed {
            attempt_count: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_string_actions_and_invalid_input() {
    let limiter = limiter();
    let now = at("2025-03-10T12:00:00Z");

    let (action, decision) = limiter
        .check_and_record_str("  Ana@Agency.gov ", "email_verification", now)
        .await
        .unwrap();
    assert_eq!(action, Action::EmailVerification);
    assert!(decision.is_allowed());

    // Stored under the normalized subject
    assert!(
        limiter
            .window("ana@agency.gov", Action::EmailVerification)
            .await
            .unwrap()
            .is_some()
    );

    let err = limiter
        .check_and_record_str("ana@agency.gov", "delete_account", now)
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());

    let err = limiter
        .check_and_record_str("two words", "login", now)
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
}
