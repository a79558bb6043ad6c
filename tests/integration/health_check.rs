//! Integration tests for the health aggregator
//!
//! These tests verify that:
//! - Every target gets exactly one record per run
//! - Broken links produce one notification listing all of them
//! - Notification failures do not lose the run's records

use std::sync::Arc;
use std::time::Duration;

use compliance_sentinel::{
    health::{HealthAggregator, HealthCheckService, StaticTargetSource},
    notify::{EmailServiceNotifier, LogNotifier},
    prober::ProbeTarget,
    storage::{HealthLog, MemoryBackend},
};
use serde_json::Value;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{RecordingNotifier, at, target, test_prober};

/// 18 healthy pages, 5 returning 500 and 2 that never answer in time
async fn mount_agency_pages(mock_server: &MockServer) -> Vec<ProbeTarget> {
    Mock::given(path_regex("^/ok/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(mock_server)
        .await;
    Mock::given(path_regex("^/broken/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(mock_server)
        .await;
    Mock::given(path_regex("^/slow/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(mock_server)
        .await;

    let base = mock_server.uri();
    let mut targets = Vec::new();
    targets.extend((0..18).map(|i| target(format!("{base}/ok/{i}"), "CA")));
    targets.extend((0..5).map(|i| target(format!("{base}/broken/{i}"), "NY")));
    targets.extend(
        (0..2).map(|i| target(format!("{base}/slow/{i}"), "TX").with_title(format!("TX board {i}"))),
    );
    targets
}

#[tokio::test]
async fn test_run_sends_one_email_with_all_broken_links() {
    let pages = MockServer::start().await;
    let email_service = MockServer::start().await;
    let targets = mount_agency_pages(&pages).await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer mail-token"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&email_service)
        .await;

    let log = Arc::new(MemoryBackend::new());
    let notifier = Arc::new(EmailServiceNotifier::new(
        format!("{}/send", email_service.uri()),
        Some("mail-token".to_string()),
        vec!["compliance@agency.example".to_string()],
    ));
    let aggregator = HealthAggregator::new(
        test_prober(10, Duration::from_millis(500), None),
        log.clone(),
        notifier,
    );

    let now = at("2025-03-10T06:00:00Z");
    let summary = aggregator.run_health_check(&targets, now).await.unwrap();

    assert_eq!(summary.total, 25);
    assert_eq!(summary.valid, 18);
    assert_eq!(summary.invalid, 7);
    assert_eq!(summary.not_attempted, 0);
    assert!(summary.notified);
    assert_eq!(summary.broken.len(), 7);

    let records = log.query_health_run(&summary.run_id).await.unwrap();
    assert_eq!(records.len(), 25);
    assert!(records.iter().all(|r| r.checked_at == now));
    assert_eq!(records.iter().filter(|r| !r.reachable).count(), 7);

    let requests = email_service.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["to"][0], "compliance@agency.example");
    assert_eq!(body["subject"], "Compliance Sentinel: 7 broken regulatory links");

    let links = body["broken_links"].as_array().unwrap();
    assert_eq!(links.len(), 7);
    // Sorted by jurisdiction
    assert_eq!(links[0]["jurisdiction"], "NY");
    assert_eq!(links[0]["error"], "HTTP 500");
    assert_eq!(links[6]["jurisdiction"], "TX");
    assert_eq!(links[6]["title"], "TX board 1");
    assert_eq!(links[6]["error"], "timeout");
}

#[tokio::test]
async fn test_no_notification_when_everything_is_reachable() {
    let pages = MockServer::start().await;
    Mock::given(path_regex("^/ok/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&pages)
        .await;

    let targets: Vec<_> = (0..5)
        .map(|i| target(format!("{}/ok/{i}", pages.uri()), "CA"))
        .collect();
    let notifier = RecordingNotifier::new();
    let aggregator = HealthAggregator::new(
        test_prober(5, Duration::from_secs(5), None),
        Arc::new(MemoryBackend::new()),
        notifier.clone(),
    );

    let summary = aggregator
        .run_health_check(&targets, at("2025-03-10T06:00:00Z"))
        .await
        .unwrap();

    assert_eq!(summary.valid, 5);
    assert_eq!(summary.invalid, 0);
    assert!(!summary.notified);
    assert!(notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_rejected_email_keeps_records() {
    let pages = MockServer::start().await;
    let email_service = MockServer::start().await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&pages)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .expect(1)
        .mount(&email_service)
        .await;

    let log = Arc::new(MemoryBackend::new());
    let aggregator = HealthAggregator::new(
        test_prober(1, Duration::from_secs(5), None),
        log.clone(),
        Arc::new(EmailServiceNotifier::new(
            email_service.uri(),
            None,
            vec!["ops@agency.example".to_string()],
        )),
    );

    let summary = aggregator
        .run_health_check(
            &[target(format!("{}/broken", pages.uri()), "OR")],
            at("2025-03-10T06:00:00Z"),
        )
        .await
        .unwrap();

    assert_eq!(summary.invalid, 1);
    assert!(!summary.notified);
    assert_eq!(log.query_health_run(&summary.run_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_is_append_only_across_runs() {
    let pages = MockServer::start().await;
    Mock::given(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&pages)
        .await;
    Mock::given(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&pages)
        .await;

    let url = format!("{}/flaky", pages.uri());
    let log = Arc::new(MemoryBackend::new());
    let service = HealthCheckService::new(
        HealthAggregator::new(
            test_prober(1, Duration::from_secs(5), None),
            log.clone(),
            Arc::new(LogNotifier),
        ),
        Arc::new(StaticTargetSource(vec![target(url.clone(), "CA")])),
    );

    let first = service.run_at(at("2025-03-10T06:00:00Z")).await.unwrap();
    let second = service.run_at(at("2025-03-11T06:00:00Z")).await.unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.valid, 1);
    assert_eq!(second.invalid, 1);

    let history = log.query_latest_for_url(&url, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].reachable, "newest first");
    assert!(history[1].reachable);
}

#[tokio::test]
async fn test_shared_url_is_reported_for_every_jurisdiction() {
    let pages = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/minimum-wage"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&pages)
        .await;
    Mock::given(method("GET"))
        .and(path("/minimum-wage"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&pages)
        .await;

    let url = format!("{}/minimum-wage", pages.uri());
    let log = Arc::new(MemoryBackend::new());
    let notifier = RecordingNotifier::new();
    let aggregator = HealthAggregator::new(
        test_prober(4, Duration::from_secs(5), None),
        log.clone(),
        notifier.clone(),
    );

    let summary = aggregator
        .run_health_check(
            &[target(url.clone(), "CA"), target(url.clone(), "US-FED")],
            at("2025-03-10T06:00:00Z"),
        )
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.invalid, 2);
    assert_eq!(summary.valid, 0);

    let mut owners: Vec<String> = log
        .query_health_run(&summary.run_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.owner_tag)
        .collect();
    owners.sort();
    assert_eq!(owners, vec!["CA", "US-FED"]);

    let sent = notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].total, 2);
    let jurisdictions: Vec<&str> = sent[0]
        .links
        .iter()
        .map(|l| l.jurisdiction.as_str())
        .collect();
    assert_eq!(jurisdictions, vec!["CA", "US-FED"]);
}
