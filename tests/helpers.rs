// Shared test helpers for reporter construction and test data.
//
// This module provides common utilities used across integration test
// files to reduce duplication.

use std::time::Duration;

use error_relay::{CapturedError, ReporterConfig};

/// Initializes test logging once; safe to call from every test.
///
/// Run with `RUST_LOG=error_relay=debug cargo test` to watch the
/// pipeline decide.
#[allow(dead_code)] // Used by other test files
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Baseline configuration pointed at a mock collector.
///
/// Retries and compression are off so each test opts into exactly the
/// behavior it exercises; the environment is non-production so the
/// mock server's loopback address passes URL validation.
#[allow(dead_code)] // Used by other test files
pub fn test_config(api_url: String) -> ReporterConfig {
    ReporterConfig {
        api_url,
        project_token: "prj_4f8a2c9d1e".to_string(),
        environment: "test".to_string(),
        require_https: false,
        enable_compression: false,
        enable_batching: false,
        max_retries: 0,
        initial_retry_delay: Duration::from_millis(5),
        max_retry_delay: Duration::from_millis(20),
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// A captured error with a distinct message (and therefore a distinct
/// fingerprint).
#[allow(dead_code)] // Used by other test files
pub fn captured(message: &str) -> CapturedError {
    CapturedError::new(message, "TestError", None)
}
