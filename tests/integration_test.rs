//! Integration tests for the delivery engine.
//!
//! These tests drive the full pipeline against a mock collector using
//! `httptest`; no real network requests are made. Request-count
//! expectations double as assertions that gated reports never reach
//! the wire.

mod helpers;

use std::time::Duration;

use httptest::{all_of, cycle, matchers::*, responders::*, Expectation, Server};

use error_relay::error_handling::DropReason;
use error_relay::{Breadcrumb, BreadcrumbLevel, ConfigError, ConfigUpdate, ErrorReporter, ReportOutcome};

use helpers::{captured, init_logging, test_config};

fn server_url(server: &Server) -> String {
    format!("http://{}", server.addr())
}

#[tokio::test]
async fn test_report_error_posts_to_webhook() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .respond_with(status_code(200)),
    );

    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .expect("construction should succeed");

    let outcome = reporter.report_error(captured("boom"), None).await;
    assert_eq!(outcome, ReportOutcome::Sent);

    let stats = reporter.stats();
    assert_eq!(stats.captured, 1);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.total_dropped, 0);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_construction_rejects_invalid_destination() {
    init_logging();
    // Malformed URL
    let result = ErrorReporter::new(test_config("not a url".to_string())).await;
    assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));

    // Placeholder token
    let mut config = test_config("http://errors.example.com".to_string());
    config.project_token = "your-token".to_string();
    let result = ErrorReporter::new(config).await;
    assert!(matches!(result, Err(ConfigError::InvalidToken(_))));

    // HTTPS required
    let mut config = test_config("http://errors.example.com".to_string());
    config.require_https = true;
    let result = ErrorReporter::new(config).await;
    assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
}

#[tokio::test]
async fn test_disabled_reporter_is_a_noop() {
    init_logging();
    // No expectations: any request to the server fails the test
    let server = Server::run();

    let mut config = test_config(server_url(&server));
    config.enabled = false;
    let reporter = ErrorReporter::new(config).await.unwrap();

    let outcome = reporter.report_error(captured("boom"), None).await;
    assert_eq!(outcome, ReportOutcome::Disabled);
    assert_eq!(reporter.stats().captured, 0);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_rate_limit_admits_exactly_two_of_three() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(2)
            .respond_with(status_code(200)),
    );

    let mut config = test_config(server_url(&server));
    config.max_requests_per_minute = 2;
    let reporter = ErrorReporter::new(config).await.unwrap();

    // Three distinct errors in quick succession
    assert_eq!(
        reporter.report_error(captured("error one"), None).await,
        ReportOutcome::Sent
    );
    assert_eq!(
        reporter.report_error(captured("error two"), None).await,
        ReportOutcome::Sent
    );
    let third = reporter.report_error(captured("error three"), None).await;
    assert_eq!(
        third,
        ReportOutcome::Dropped {
            reason: DropReason::RateLimited,
            retry_after: None,
        }
    );

    let stats = reporter.stats();
    assert_eq!(stats.sent, 2);
    assert_eq!(
        *stats.dropped.get("Rate limit exceeded").unwrap_or(&0),
        1
    );

    reporter.destroy().await;
}

#[tokio::test]
async fn test_duplicate_error_suppressed_within_window() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .unwrap();

    assert_eq!(
        reporter.report_error(captured("same error"), None).await,
        ReportOutcome::Sent
    );
    let second = reporter.report_error(captured("same error"), None).await;
    assert_eq!(
        second,
        ReportOutcome::Dropped {
            reason: DropReason::DuplicateError,
            retry_after: None,
        }
    );

    reporter.destroy().await;
}

#[tokio::test]
async fn test_offline_report_queues_without_network() {
    init_logging();
    // No expectations: a network call while offline fails the test
    let server = Server::run();
    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .unwrap();

    reporter.set_online(false).await;
    let outcome = reporter.report_error(captured("while offline"), None).await;
    assert_eq!(outcome, ReportOutcome::Queued);
    assert_eq!(reporter.offline_queue_size(), 1);

    // Reconnect: exactly one network call replays the queued report
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );
    let replayed = reporter.set_online(true).await;
    assert_eq!(replayed, 1);
    assert_eq!(reporter.offline_queue_size(), 0);
    assert_eq!(reporter.stats().replayed, 1);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_failed_delivery_falls_back_to_offline_queue() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(500)),
    );

    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .unwrap();

    let outcome = reporter.report_error(captured("backend down"), None).await;
    assert_eq!(outcome, ReportOutcome::Queued);
    assert_eq!(reporter.offline_queue_size(), 1);
    assert_eq!(reporter.stats().queued, 1);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_retry_succeeds_after_transient_failures() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(3)
            .respond_with(cycle![
                status_code(500),
                status_code(503),
                status_code(200),
            ]),
    );

    let mut config = test_config(server_url(&server));
    config.max_retries = 2;
    let reporter = ErrorReporter::new(config).await.unwrap();

    let outcome = reporter.report_error(captured("flaky backend"), None).await;
    assert_eq!(outcome, ReportOutcome::Sent);
    assert_eq!(reporter.stats().sent, 1);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    init_logging();
    let server = Server::run();
    // Exactly one request: 401 must short-circuit the retry budget
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(401)),
    );

    let mut config = test_config(server_url(&server));
    config.max_retries = 5;
    let reporter = ErrorReporter::new(config).await.unwrap();

    let outcome = reporter.report_error(captured("bad credentials"), None).await;
    // Terminal transport failure escalates to the offline queue
    assert_eq!(outcome, ReportOutcome::Queued);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_circuit_breaker_gates_after_failures() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(500)),
    );

    let mut config = test_config(server_url(&server));
    config.failure_threshold = 1;
    config.circuit_breaker_timeout = Duration::from_secs(60);
    let reporter = ErrorReporter::new(config).await.unwrap();

    // First report burns the one allowed failure and opens the circuit
    assert_eq!(
        reporter.report_error(captured("first failure"), None).await,
        ReportOutcome::Queued
    );

    // Second report is gated: queued with no network call (the server
    // expectation of exactly one request verifies this)
    assert_eq!(
        reporter.report_error(captured("gated report"), None).await,
        ReportOutcome::Queued
    );
    assert_eq!(
        reporter.circuit_stats().state,
        error_relay::circuit_breaker::CircuitState::Open
    );

    reporter.destroy().await;
}

#[tokio::test]
async fn test_daily_quota_drops_with_retry_hint() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let mut config = test_config(server_url(&server));
    config.daily_limit = 1;
    let reporter = ErrorReporter::new(config).await.unwrap();

    assert_eq!(
        reporter.report_error(captured("within quota"), None).await,
        ReportOutcome::Sent
    );

    match reporter.report_error(captured("over quota"), None).await {
        ReportOutcome::Dropped { reason, retry_after } => {
            assert_eq!(reason, DropReason::DailyQuotaExceeded);
            let hint = retry_after.expect("daily quota drop should carry a retry hint");
            assert!(hint <= Duration::from_secs(24 * 60 * 60));
        }
        other => panic!("expected quota drop, got {:?}", other),
    }

    reporter.destroy().await;
}

#[tokio::test]
async fn test_batching_accumulates_and_flushes_at_size() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let mut config = test_config(server_url(&server));
    config.enable_batching = true;
    config.batch_size = 2;
    let reporter = ErrorReporter::new(config).await.unwrap();

    assert_eq!(
        reporter.report_error(captured("batched one"), None).await,
        ReportOutcome::Batched
    );
    assert_eq!(
        reporter.report_error(captured("batched two"), None).await,
        ReportOutcome::Batched
    );

    let batch_stats = reporter.batch_stats();
    assert_eq!(batch_stats.total_batches, 1);
    assert_eq!(batch_stats.total_errors, 2);
    assert_eq!(batch_stats.pending, 0);
    assert_eq!(reporter.stats().sent, 2);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_partial_batch_flushes_on_timeout() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let mut config = test_config(server_url(&server));
    config.enable_batching = true;
    config.batch_size = 100;
    config.batch_timeout = Duration::from_millis(50);
    let reporter = ErrorReporter::new(config).await.unwrap();

    reporter.report_error(captured("lonely report"), None).await;
    assert_eq!(reporter.batch_stats().pending, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(reporter.batch_stats().pending, 0);
    assert_eq!(reporter.batch_stats().total_batches, 1);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_compression_kicks_in_above_threshold() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/webhook"),
            request::body(matches("\"compressed\":true")),
        ])
        .respond_with(status_code(200)),
    );

    let mut config = test_config(server_url(&server));
    config.enable_compression = true;
    config.compression_threshold = 64;
    let reporter = ErrorReporter::new(config).await.unwrap();

    let outcome = reporter
        .report_error(
            captured(&format!("large payload {}", "x".repeat(512))),
            None,
        )
        .await;
    assert_eq!(outcome, ReportOutcome::Sent);
    assert_eq!(reporter.compression_stats().payloads_compressed, 1);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_sensitive_data_sanitized_before_send() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/webhook"),
            request::body(matches("\\[REDACTED\\]")),
            request::body(matches("\\[EMAIL\\]")),
        ])
        .respond_with(status_code(200)),
    );

    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .unwrap();

    reporter.add_breadcrumb(
        Breadcrumb::new("user user@example.com signed in", "auth", BreadcrumbLevel::Info),
    );
    let outcome = reporter
        .report_error(
            captured("login failed"),
            Some(serde_json::json!({"password": "hunter2", "step": "submit"})),
        )
        .await;
    assert_eq!(outcome, ReportOutcome::Sent);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_update_config_rejects_invalid_destination() {
    init_logging();
    let server = Server::run();
    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .unwrap();
    let original_url = reporter.config().api_url.clone();

    let result = reporter.update_config(ConfigUpdate {
        api_url: Some("ftp://nowhere".to_string()),
        ..Default::default()
    });
    assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));

    // The previous configuration stays in place
    assert_eq!(reporter.config().api_url, original_url);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_update_config_applies_new_limits() {
    init_logging();
    let server = Server::run();
    // Only one request: after the update, the second report is gated
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );

    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .unwrap();

    reporter
        .update_config(ConfigUpdate {
            max_requests_per_minute: Some(1),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(
        reporter.report_error(captured("first"), None).await,
        ReportOutcome::Sent
    );
    assert_eq!(
        reporter.report_error(captured("second"), None).await,
        ReportOutcome::Dropped {
            reason: DropReason::RateLimited,
            retry_after: None,
        }
    );

    reporter.destroy().await;
}

#[tokio::test]
async fn test_report_message_uses_message_type() {
    init_logging();
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/webhook"),
            request::body(matches("\"exception_class\":\"Message\"")),
        ])
        .respond_with(status_code(200)),
    );

    let reporter = ErrorReporter::new(test_config(server_url(&server)))
        .await
        .unwrap();

    let outcome = reporter.report_message("deploy finished", None).await;
    assert_eq!(outcome, ReportOutcome::Sent);

    reporter.destroy().await;
}
