//! Outbound payload shape.
//!
//! The collector expects a flat JSON document per report; batches are a
//! JSON array of the same shape. Field names follow the collector's
//! webhook contract, not Rust conventions.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::SDK_VERSION;

use super::stack::top_meaningful_frame;
use super::ErrorReport;

/// The JSON body POSTed to `{api_url}/webhook` for one report.
#[derive(Debug, Clone, Serialize)]
pub struct WirePayload {
    /// Error message.
    pub message: String,
    /// Error type or class name.
    pub exception_class: String,
    /// Source file of the top meaningful stack frame.
    pub file: Option<String>,
    /// Line number of the top meaningful stack frame.
    pub line: Option<u32>,
    /// Project token.
    pub project: String,
    /// Raw stack trace text.
    pub stack_trace: Option<String>,
    /// Deployment environment.
    pub environment: String,
    /// Commit hash of the running build, if known.
    #[serde(rename = "commitHash")]
    pub commit_hash: Option<String>,
    /// Capture time in epoch milliseconds.
    pub timestamp: i64,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Page or resource URL at capture time.
    pub url: Option<String>,
    /// Application-assigned user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Application-assigned user email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Custom data merged with breadcrumbs and the SDK version marker.
    pub custom_data: Value,
}

impl WirePayload {
    /// Builds the wire shape from a validated report.
    pub fn from_report(report: &ErrorReport, commit_hash: Option<&str>) -> Self {
        let top_frame = report
            .stack
            .as_deref()
            .and_then(top_meaningful_frame);

        // custom_data carries the caller's data plus breadcrumbs and the
        // SDK version, merged into one object for the collector.
        let mut custom_data = match &report.context.custom_data {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
            None => serde_json::Map::new(),
        };
        custom_data.insert(
            "breadcrumbs".to_string(),
            serde_json::to_value(&report.context.breadcrumbs).unwrap_or(Value::Null),
        );
        custom_data.insert("sdk_version".to_string(), json!(SDK_VERSION));

        WirePayload {
            message: report.message.clone(),
            exception_class: report.error_type.clone(),
            file: top_frame.as_ref().and_then(|f| f.file.clone()),
            line: top_frame.as_ref().and_then(|f| f.line),
            project: report.project_token.clone(),
            stack_trace: report.stack.clone(),
            environment: report.environment.clone(),
            commit_hash: commit_hash.map(str::to_string),
            timestamp: report.context.timestamp.timestamp_millis(),
            user_agent: report.context.user_agent.clone(),
            url: report.context.url.clone(),
            user_id: report.context.user_id.clone(),
            user_email: report.context.user_email.clone(),
            custom_data: Value::Object(custom_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Breadcrumb, BreadcrumbLevel, ReportContext};
    use chrono::Utc;

    fn sample_report() -> ErrorReport {
        ErrorReport {
            message: "boom".to_string(),
            stack: Some("at handler (src/routes/orders.rs:88:4)".to_string()),
            error_type: "OrderError".to_string(),
            environment: "production".to_string(),
            project_token: "prj_4f8a2c9d1e".to_string(),
            context: ReportContext {
                url: Some("https://shop.example.com/checkout".to_string()),
                user_agent: Some("integration-test".to_string()),
                timestamp: Utc::now(),
                user_id: Some("u-17".to_string()),
                user_email: None,
                custom_data: Some(serde_json::json!({"order_id": 42})),
                breadcrumbs: vec![Breadcrumb::new("add to cart", "ui", BreadcrumbLevel::Info)],
            },
        }
    }

    #[test]
    fn test_wire_payload_extracts_top_frame() {
        let payload = WirePayload::from_report(&sample_report(), Some("abc123"));
        assert_eq!(payload.file.as_deref(), Some("src/routes/orders.rs"));
        assert_eq!(payload.line, Some(88));
        assert_eq!(payload.exception_class, "OrderError");
        assert_eq!(payload.commit_hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_wire_payload_merges_custom_data() {
        let payload = WirePayload::from_report(&sample_report(), None);
        let custom = payload.custom_data.as_object().unwrap();
        assert_eq!(custom["order_id"], 42);
        assert_eq!(custom["sdk_version"], SDK_VERSION);
        assert_eq!(custom["breadcrumbs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_wire_payload_serializes_commit_hash_key() {
        let payload = WirePayload::from_report(&sample_report(), Some("abc123"));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["commitHash"], "abc123");
        assert!(json.get("user_email").is_none());
    }

    #[test]
    fn test_wire_payload_wraps_non_object_custom_data() {
        let mut report = sample_report();
        report.context.custom_data = Some(serde_json::json!([1, 2, 3]));
        let payload = WirePayload::from_report(&report, None);
        let custom = payload.custom_data.as_object().unwrap();
        assert_eq!(custom["data"], serde_json::json!([1, 2, 3]));
    }
}
