//! Offline store persistence across reporter restarts.
//!
//! The offline queue and quota usage are the only state that must
//! survive a process restart; these tests exercise the on-disk store
//! end to end through two reporter lifetimes.

mod helpers;

use httptest::{all_of, matchers::*, responders::*, Expectation, Server};

use error_relay::{ErrorReporter, ReportOutcome};

use helpers::{captured, init_logging, test_config};

fn server_url(server: &Server) -> String {
    format!("http://{}", server.addr())
}

#[tokio::test]
async fn test_queued_reports_survive_restart() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("relay_state.db");
    let server = Server::run();

    // First lifetime: report while offline, then shut down
    {
        let mut config = test_config(server_url(&server));
        config.offline_store_path = Some(store_path.clone());
        let reporter = ErrorReporter::new(config).await.unwrap();

        reporter.set_online(false).await;
        let outcome = reporter.report_error(captured("crashed offline"), None).await;
        assert_eq!(outcome, ReportOutcome::Queued);
        assert_eq!(reporter.offline_queue_size(), 1);

        reporter.destroy().await;
    }

    // Second lifetime: the queue is restored and replays on reconnect
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/webhook"),
            request::body(matches("crashed offline")),
        ])
        .times(1)
        .respond_with(status_code(200)),
    );

    let mut config = test_config(server_url(&server));
    config.offline_store_path = Some(store_path);
    let reporter = ErrorReporter::new(config).await.unwrap();
    assert_eq!(reporter.offline_queue_size(), 1);

    let replayed = reporter.process_offline_queue().await;
    assert_eq!(replayed, 1);
    assert_eq!(reporter.offline_queue_size(), 0);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_quota_usage_survives_restart() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("relay_state.db");
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );

    {
        let mut config = test_config(server_url(&server));
        config.offline_store_path = Some(store_path.clone());
        let reporter = ErrorReporter::new(config).await.unwrap();

        assert_eq!(
            reporter.report_error(captured("counted"), None).await,
            ReportOutcome::Sent
        );
        assert_eq!(reporter.quota_usage().daily_used, 1);

        reporter.destroy().await;
    }

    let mut config = test_config(server_url(&server));
    config.offline_store_path = Some(store_path);
    let reporter = ErrorReporter::new(config).await.unwrap();
    assert_eq!(reporter.quota_usage().daily_used, 1);
    assert!(reporter.quota_usage().total_bytes_used > 0);

    reporter.destroy().await;
}

#[tokio::test]
async fn test_reset_quota_clears_persisted_counters() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("relay_state.db");
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/webhook"))
            .times(1)
            .respond_with(status_code(200)),
    );

    {
        let mut config = test_config(server_url(&server));
        config.offline_store_path = Some(store_path.clone());
        let reporter = ErrorReporter::new(config).await.unwrap();
        reporter.report_error(captured("counted"), None).await;
        reporter.reset_quota().await;
        reporter.destroy().await;
    }

    let mut config = test_config(server_url(&server));
    config.offline_store_path = Some(store_path);
    let reporter = ErrorReporter::new(config).await.unwrap();
    assert_eq!(reporter.quota_usage().daily_used, 0);
    assert_eq!(reporter.quota_usage().total_bytes_used, 0);

    reporter.destroy().await;
}
