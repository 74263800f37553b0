//! Collector HTTP transport.
//!
//! One POST per report (or per batch) to `{api_url}/webhook`. The
//! request is bounded by the configured timeout; an aborted call comes
//! back as a retryable transport error.

use std::sync::{Arc, Mutex};

use crate::config::{ReporterConfig, SDK_VERSION, WEBHOOK_PATH};
use crate::error_handling::{ConfigError, SendError};

/// Header identifying the SDK to the collector.
const SDK_HEADER: &str = "X-Error-Relay-Version";

/// HTTP client for the collector webhook.
pub struct Transport {
    client: reqwest::Client,
    config: Arc<Mutex<ReporterConfig>>,
}

impl Transport {
    /// Builds a client honoring the configured request timeout.
    pub fn new(config: Arc<Mutex<ReporterConfig>>) -> Result<Self, ConfigError> {
        let timeout = config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .request_timeout;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Transport { client, config })
    }

    /// POSTs a prepared JSON body to the webhook endpoint.
    ///
    /// 2xx resolves; anything else maps onto the transport taxonomy,
    /// with 429 and 413 carrying their distinguished reasons for the
    /// retry classifier.
    pub async fn send_body(&self, body: String) -> Result<(), SendError> {
        let (endpoint, debug) = {
            let config = self
                .config
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            (
                format!("{}{}", config.api_url.trim_end_matches('/'), WEBHOOK_PATH),
                config.debug,
            )
        };

        if debug {
            log::debug!("POST {} ({} bytes)", endpoint, body.len());
        }

        let response = self
            .client
            .post(&endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SDK_HEADER, SDK_VERSION)
            .body(body)
            .send()
            .await
            .map_err(SendError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = match status.as_u16() {
            429 => "rate limit exceeded".to_string(),
            413 => "payload too large".to_string(),
            _ => {
                let text = response.text().await.unwrap_or_default();
                if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string()
                } else {
                    text
                }
            }
        };

        Err(SendError::Http {
            status: status.as_u16(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn transport_for(server: &Server) -> Transport {
        let config = Arc::new(Mutex::new(ReporterConfig {
            api_url: format!("http://{}", server.addr()),
            project_token: "prj_4f8a2c9d1e".to_string(),
            require_https: false,
            environment: "test".to_string(),
            ..Default::default()
        }));
        Transport::new(config).expect("client should build")
    }

    #[tokio::test]
    async fn test_posts_to_webhook_path() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/webhook"))
                .respond_with(status_code(200)),
        );

        let transport = transport_for(&server);
        transport
            .send_body("{\"message\":\"boom\"}".to_string())
            .await
            .expect("2xx should resolve");
    }

    #[tokio::test]
    async fn test_maps_429_to_distinguished_reason() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/webhook"))
                .respond_with(status_code(429)),
        );

        let transport = transport_for(&server);
        let result = transport.send_body("{}".to_string()).await;
        match result {
            Err(SendError::Http { status, reason }) => {
                assert_eq!(status, 429);
                assert!(reason.contains("rate limit"));
            }
            other => panic!("expected 429 error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_maps_413_to_distinguished_reason() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/webhook"))
                .respond_with(status_code(413)),
        );

        let transport = transport_for(&server);
        let result = transport.send_body("{}".to_string()).await;
        match result {
            Err(SendError::Http { status, reason }) => {
                assert_eq!(status, 413);
                assert!(reason.contains("too large"));
            }
            other => panic!("expected 413 error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_network_error() {
        // RFC 5737 test address, nothing listens there
        let config = Arc::new(Mutex::new(ReporterConfig {
            api_url: "http://192.0.2.1:9".to_string(),
            project_token: "prj_4f8a2c9d1e".to_string(),
            require_https: false,
            environment: "test".to_string(),
            request_timeout: std::time::Duration::from_millis(200),
            ..Default::default()
        }));
        let transport = Transport::new(config).expect("client should build");

        let result = transport.send_body("{}".to_string()).await;
        assert!(matches!(
            result,
            Err(SendError::Timeout) | Err(SendError::Network(_))
        ));
    }
}
