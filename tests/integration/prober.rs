//! Integration tests for the URL prober against a mock HTTP server
//!
//! These tests verify that:
//! - Status codes and transport errors are classified correctly
//! - HEAD rejections fall back to GET
//! - Concurrency is bounded and the outer deadline truncates runs

use std::time::{Duration, Instant};

use compliance_sentinel::prober::ProbeErrorKind;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{closed_port_url, target, test_prober};

#[tokio::test]
async fn test_status_classification() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let prober = test_prober(4, Duration::from_secs(5), None);

    let ok = prober
        .probe_one(&target(format!("{}/ok", mock_server.uri()), "CA"))
        .await;
    assert!(ok.reachable);
    assert_eq!(ok.status_code, Some(200));
    assert_eq!(ok.error_kind, ProbeErrorKind::None);

    let gone = prober
        .probe_one(&target(format!("{}/gone", mock_server.uri()), "CA"))
        .await;
    assert!(!gone.reachable);
    assert_eq!(gone.status_code, Some(404));
    assert_eq!(gone.failure_reason().as_deref(), Some("HTTP 404"));

    let down = prober
        .probe_one(&target(format!("{}/down", mock_server.uri()), "CA"))
        .await;
    assert!(!down.reachable);
    assert_eq!(down.status_code, Some(503));
}

#[tokio::test]
async fn test_head_rejected_falls_back_to_get() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/rules"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rules"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prober = test_prober(1, Duration::from_secs(5), None);
    let result = prober
        .probe_one(&target(format!("{}/rules", mock_server.uri()), "NY"))
        .await;

    assert!(result.reachable);
    assert_eq!(result.status_code, Some(200));
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "/new"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let prober = test_prober(1, Duration::from_secs(5), None);
    let result = prober
        .probe_one(&target(format!("{}/old", mock_server.uri()), "TX"))
        .await;

    assert!(result.reachable);
    assert_eq!(result.status_code, Some(200));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let prober = test_prober(1, Duration::from_millis(200), None);
    let result = prober
        .probe_one(&target(format!("{}/slow", mock_server.uri()), "FL"))
        .await;

    assert!(!result.reachable);
    assert_eq!(result.error_kind, ProbeErrorKind::Timeout);
    assert_eq!(result.status_code, None);
    assert!(result.latency_ms < 2_000);
}

#[tokio::test]
async fn test_refused_connection() {
    let url = closed_port_url().await;
    let prober = test_prober(1, Duration::from_secs(2), None);

    let result = prober.probe_one(&target(url, "WA")).await;

    assert!(!result.reachable);
    assert_eq!(result.error_kind, ProbeErrorKind::Connection);
    assert!(result.error_message.is_some());
}

#[tokio::test]
async fn test_shared_url_requested_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/shared"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/shared", mock_server.uri());
    let prober = test_prober(4, Duration::from_secs(5), None);

    let batch = prober
        .probe_all(&[target(url.clone(), "CA"), target(url.clone(), "US-FED")])
        .await;

    // One request, one result per target
    assert_eq!(batch.results.len(), 2);
    assert!(batch.results.iter().all(|r| r.url == url && r.reachable));
    assert_eq!(batch.not_attempted, 0);
}

#[tokio::test]
async fn test_results_follow_target_order() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&mock_server)
        .await;
    Mock::given(path("/fast"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let slow = format!("{}/slow", mock_server.uri());
    let fast = format!("{}/fast", mock_server.uri());
    let prober = test_prober(4, Duration::from_secs(5), None);

    let batch = prober
        .probe_all(&[target(slow.clone(), "CA"), target(fast.clone(), "NY")])
        .await;

    let urls: Vec<&str> = batch.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec![slow.as_str(), fast.as_str()]);
}

#[tokio::test]
async fn test_concurrency_bounds_wall_time() {
    let mock_server = MockServer::start().await;
    Mock::given(path_regex("^/page/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&mock_server)
        .await;

    let targets: Vec<_> = (0..10)
        .map(|i| target(format!("{}/page/{i}", mock_server.uri()), "CA"))
        .collect();

    let prober = test_prober(5, Duration::from_secs(5), None);
    let start = Instant::now();
    let batch = prober.probe_all(&targets).await;
    let elapsed = start.elapsed();

    assert_eq!(batch.results.len(), 10);
    assert_eq!(batch.reachable_count(), 10);
    // Two waves of five
    assert!(elapsed >= Duration::from_millis(550), "too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "too slow: {elapsed:?}");
}

#[tokio::test]
async fn test_outer_deadline_truncates_run() {
    let mock_server = MockServer::start().await;
    Mock::given(path("/fast"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(path_regex("^/stuck/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let mut targets = vec![target(format!("{}/fast", mock_server.uri()), "CA")];
    targets.extend((0..4).map(|i| target(format!("{}/stuck/{i}", mock_server.uri()), "CA")));

    let prober = test_prober(5, Duration::from_secs(30), Some(Duration::from_millis(500)));
    let start = Instant::now();
    let batch = prober.probe_all(&targets).await;

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(batch.results.len(), 1);
    assert!(batch.results[0].reachable);
    assert_eq!(batch.not_attempted, 4);
    assert!(batch.is_truncated());
}
