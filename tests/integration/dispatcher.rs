//! Integration tests for the tick dispatcher wired from configuration
//!
//! These tests verify that:
//! - Only jobs whose schedule matches the tick hour are triggered
//! - A failing job does not affect the others
//! - Retention runs through the configured limiter and health log
//! - The weekly health check runs in its window and records every target

use std::io::Write;

use compliance_sentinel::{Sentinel, rate_limit::Action, storage::HealthLog};
use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{at, config_from_json};

async fn sentinel_with_jobs(mock_server: &MockServer) -> Sentinel {
    let config = config_from_json(json!({
        "jobs": [
            {
                "name": "trial-reminders",
                "type": "http",
                "url": format!("{}/jobs/reminders", mock_server.uri()),
                "token": "cron-secret",
                "schedule": {"every": "daily", "hour": 9}
            },
            {
                "name": "weekly-digest",
                "type": "http",
                "url": format!("{}/jobs/digest", mock_server.uri()),
                "schedule": {"every": "weekly", "day": "Mon", "hour": 8}
            },
            {
                "name": "feed-sync",
                "type": "http",
                "url": format!("{}/jobs/sync", mock_server.uri())
            },
            {"name": "retention", "type": "retention"}
        ],
        "storage": {"backend": "none"}
    }));

    Sentinel::from_config(&config).await.unwrap()
}

#[tokio::test]
async fn test_hour_mismatch_is_not_triggered() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/jobs/reminders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(path("/jobs/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 2})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sentinel = sentinel_with_jobs(&mock_server).await;
    // A Tuesday, one hour past the reminder slot
    let report = sentinel.dispatcher.tick(at("2025-03-11T10:00:00Z")).await;

    assert!(!report.skipped);
    let names: Vec<&str> = report.jobs.iter().map(|j| j.job_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["trial-reminders", "weekly-digest", "feed-sync", "retention"]
    );

    let reminders = report.job("trial-reminders").unwrap();
    assert!(!reminders.triggered);
    assert!(reminders.success);
    assert!(reminders.message.contains("daily at 09:00 UTC"));

    assert!(!report.job("weekly-digest").unwrap().triggered);

    let sync = report.job("feed-sync").unwrap();
    assert!(sync.triggered);
    assert!(sync.success);
    assert_eq!(sync.records_affected, 2);

    assert_eq!(report.triggered_count(), 2);
    assert_eq!(report.failed_count(), 0);
}

#[tokio::test]
async fn test_due_jobs_run_and_failures_are_isolated() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs/reminders"))
        .and(header("authorization", "Bearer cron-secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"processed": 4, "message": "sent 4 reminders"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(path("/jobs/digest"))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp relay down"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(path("/jobs/sync"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&mock_server)
        .await;

    let sentinel = sentinel_with_jobs(&mock_server).await;

    // Monday 08:00: digest due, reminders not
    let monday = sentinel.dispatcher.tick(at("2025-03-10T08:00:00Z")).await;
    let digest = monday.job("weekly-digest").unwrap();
    assert!(digest.triggered);
    assert!(!digest.success);
    assert_eq!(digest.message, "HTTP 500: smtp relay down");
    assert!(monday.job("feed-sync").unwrap().success);
    assert!(monday.job("retention").unwrap().success);
    assert_eq!(monday.failed_count(), 1);

    // Monday 09:00: reminders due, digest not
    let later = sentinel.dispatcher.tick(at("2025-03-10T09:00:00Z")).await;
    let reminders = later.job("trial-reminders").unwrap();
    assert!(reminders.triggered);
    assert!(reminders.success);
    assert_eq!(reminders.message, "sent 4 reminders");
    assert_eq!(reminders.records_affected, 4);
    assert!(!later.job("weekly-digest").unwrap().triggered);
    assert_eq!(later.failed_count(), 0);
}

#[tokio::test]
async fn test_retention_purges_expired_windows() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/jobs/sync"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let sentinel = sentinel_with_jobs(&mock_server).await;
    let start = at("2025-03-10T12:00:00Z");

    sentinel
        .limiter
        .check_and_record("203.0.113.9", Action::Login, start)
        .await
        .unwrap();
    sentinel
        .limiter
        .check_and_record("ana@agency.gov", Action::Signup, start)
        .await
        .unwrap();

    // Login windows (15 min) have expired, signup windows (60 min) have not
    let report = sentinel.dispatcher.tick(at("2025-03-10T12:30:00Z")).await;
    let retention = report.job("retention").unwrap();
    assert!(retention.success);
    assert_eq!(retention.records_affected, 1);

    assert!(
        sentinel
            .limiter
            .window("203.0.113.9", Action::Login)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        sentinel
            .limiter
            .window("ana@agency.gov", Action::Signup)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_weekly_health_check_job() {
    let pages = MockServer::start().await;
    Mock::given(path("/labor/notices"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&pages)
        .await;
    Mock::given(path("/tax/bulletins"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&pages)
        .await;

    let ok_url = format!("{}/labor/notices", pages.uri());
    let broken_url = format!("{}/tax/bulletins", pages.uri());
    let mut targets_file = NamedTempFile::new().unwrap();
    write!(
        targets_file,
        "{}",
        json!([
            {"url": ok_url, "category": "news_page", "owner_tag": "CA"},
            {"url": broken_url, "category": "regulation_page", "owner_tag": "NY", "title": "Tax bulletins"}
        ])
    )
    .unwrap();

    let config = config_from_json(json!({
        "jobs": [{
            "name": "link-health",
            "type": "health_check",
            "schedule": {"every": "weekly", "day": "Mon", "hour": 6}
        }],
        "prober": {"concurrency": 2, "timeout_secs": 5},
        "health": {"targets_file": targets_file.path()},
        "storage": {"backend": "none"}
    }));
    let sentinel = Sentinel::from_config(&config).await.unwrap();

    // Monday 06:00 is inside the weekly window
    let monday = sentinel.dispatcher.tick(at("2025-03-10T06:00:00Z")).await;
    let run = monday.job("link-health").unwrap();
    assert!(run.triggered);
    assert!(run.success, "{}", run.message);
    assert_eq!(run.records_affected, 2);
    assert!(run.message.starts_with("1 valid, 1 invalid of 2 links"));

    let ok_history = sentinel.health_log.query_latest_for_url(&ok_url, 10).await.unwrap();
    assert_eq!(ok_history.len(), 1);
    assert!(ok_history[0].reachable);

    let broken_history = sentinel
        .health_log
        .query_latest_for_url(&broken_url, 10)
        .await
        .unwrap();
    assert_eq!(broken_history.len(), 1);
    assert!(!broken_history[0].reachable);
    assert_eq!(broken_history[0].owner_tag, "NY");
    assert_eq!(broken_history[0].status_code, Some(500));

    // Tuesday 06:00 is not
    let tuesday = sentinel.dispatcher.tick(at("2025-03-11T06:00:00Z")).await;
    let skipped = tuesday.job("link-health").unwrap();
    assert!(!skipped.triggered);
    assert!(skipped.message.contains("not scheduled"));
    assert_eq!(
        sentinel
            .health_log
            .query_latest_for_url(&ok_url, 10)
            .await
            .unwrap()
            .len(),
        1
    );
}
