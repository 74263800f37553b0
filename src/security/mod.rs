//! Destination, credential, and payload validation.
//!
//! Everything here runs before a byte leaves the process: the collector
//! URL and project token are vetted at construction, payload size is
//! capped on the way out, and report data is scrubbed of secrets.

mod sanitize;
mod token;
mod url_validation;

pub use sanitize::{is_sensitive_key, sanitize_data, scrub_text, REDACTED};
pub use token::validate_project_token;
pub use url_validation::validate_api_url;

use crate::config::ReporterConfig;
use crate::error_handling::ValidationError;

/// Validation rules derived from the reporter configuration.
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    require_https: bool,
    allowed_domains: Vec<String>,
    production: bool,
    max_payload_bytes: usize,
}

impl SecurityValidator {
    /// Builds the validator from the active configuration.
    pub fn from_config(config: &ReporterConfig) -> Self {
        SecurityValidator {
            require_https: config.require_https,
            allowed_domains: config.allowed_domains.clone(),
            production: config.is_production(),
            max_payload_bytes: config.max_payload_size,
        }
    }

    /// Validates a collector base URL against the configured rules.
    pub fn validate_api_url(&self, url: &str) -> Result<(), ValidationError> {
        validate_api_url(
            url,
            self.require_https,
            &self.allowed_domains,
            self.production,
        )
    }

    /// Validates a project token.
    pub fn validate_project_token(&self, token: &str) -> Result<(), ValidationError> {
        validate_project_token(token)
    }

    /// Rejects serialized payloads above the configured ceiling.
    pub fn validate_payload_size(&self, payload: &[u8]) -> Result<(), ValidationError> {
        if payload.len() > self.max_payload_bytes {
            return Err(ValidationError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }
}
