//! Report data model.
//!
//! Defines the immutable [`ErrorReport`] the pipeline moves around, the
//! bounded breadcrumb trail attached to it, and the queued wrapper the
//! offline store persists.

mod stack;
mod wire;

pub use stack::{parse_frames, StackFrame};
pub use wire::WirePayload;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw captured error handed to the engine by an out-of-scope adapter.
#[derive(Debug, Clone)]
pub struct CapturedError {
    /// Human-readable error message.
    pub message: String,
    /// Error type or class name (e.g. "TypeError", "io::Error").
    pub type_name: String,
    /// Raw stack trace text, when one was captured.
    pub stack: Option<String>,
}

impl CapturedError {
    /// Creates a captured error from its parts.
    pub fn new(
        message: impl Into<String>,
        type_name: impl Into<String>,
        stack: Option<String>,
    ) -> Self {
        CapturedError {
            message: message.into(),
            type_name: type_name.into(),
            stack,
        }
    }

    /// Captures a standard error value, using its concrete type name.
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        CapturedError {
            message: error.to_string(),
            type_name: std::any::type_name::<E>().to_string(),
            stack: None,
        }
    }

    /// Captures an `anyhow::Error`, folding its cause chain into a
    /// pseudo-stack so chained contexts survive into the report.
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let stack = error
            .chain()
            .skip(1)
            .map(|cause| format!("caused by: {}", cause))
            .collect::<Vec<_>>()
            .join("\n");
        CapturedError {
            message: error.to_string(),
            type_name: "Error".to_string(),
            stack: if stack.is_empty() { None } else { Some(stack) },
        }
    }
}

/// Severity of a breadcrumb entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine application event.
    Info,
    /// Something unexpected but recoverable.
    Warning,
    /// A failure worth reporting on its own.
    Error,
}

impl BreadcrumbLevel {
    /// Returns the lowercase wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreadcrumbLevel::Debug => "debug",
            BreadcrumbLevel::Info => "info",
            BreadcrumbLevel::Warning => "warning",
            BreadcrumbLevel::Error => "error",
        }
    }
}

/// One trail entry recording what the application did before an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub message: String,
    /// Event category (e.g. "navigation", "http", "console").
    pub category: String,
    /// Severity of the event.
    pub level: BreadcrumbLevel,
    /// Structured event detail, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Breadcrumb {
    /// Creates a breadcrumb stamped with the current time.
    pub fn new(
        message: impl Into<String>,
        category: impl Into<String>,
        level: BreadcrumbLevel,
    ) -> Self {
        Breadcrumb {
            timestamp: Utc::now(),
            message: message.into(),
            category: category.into(),
            level,
            data: None,
        }
    }

    /// Attaches structured detail to the breadcrumb.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Bounded FIFO sequence of breadcrumbs.
///
/// Insertion order is the only meaningful order; once the capacity is
/// reached the oldest entry is dropped to make room.
#[derive(Debug)]
pub struct BreadcrumbTrail {
    entries: VecDeque<Breadcrumb>,
    capacity: usize,
}

impl BreadcrumbTrail {
    /// Creates an empty trail with the given capacity.
    pub fn new(capacity: usize) -> Self {
        BreadcrumbTrail {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Appends a breadcrumb, evicting the oldest entry at capacity.
    pub fn push(&mut self, breadcrumb: Breadcrumb) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(breadcrumb);
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Changes the capacity, trimming oldest entries if necessary.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }

    /// Copies the current trail in insertion order.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the trail holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ambient context captured alongside an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportContext {
    /// Page or resource URL active at capture time.
    pub url: Option<String>,
    /// Client user agent string.
    pub user_agent: Option<String>,
    /// Capture timestamp.
    pub timestamp: DateTime<Utc>,
    /// Application-assigned user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Application-assigned user email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Arbitrary sanitized application data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Value>,
    /// Breadcrumb trail snapshot, oldest first.
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// A validated, immutable error report.
///
/// Constructed once by the orchestrator from a [`CapturedError`] plus
/// ambient context; no pipeline stage mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Sanitized error message.
    pub message: String,
    /// Raw stack trace, when captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Error type or class name.
    pub error_type: String,
    /// Deployment environment the error occurred in.
    pub environment: String,
    /// Project token the report is billed against.
    pub project_token: String,
    /// Ambient context at capture time.
    pub context: ReportContext,
}

impl ErrorReport {
    /// Serialized size of the report in bytes.
    ///
    /// Reports are plain data and always serialize; a failure here is a
    /// bug, reported as size zero rather than a panic.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

/// An undelivered report parked in the offline queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedReport {
    /// The report awaiting delivery.
    pub report: ErrorReport,
    /// When the report was enqueued.
    pub timestamp: DateTime<Utc>,
    /// Replay attempts made so far.
    pub attempts: u32,
}

impl QueuedReport {
    /// Wraps a report for queueing, stamped with the current time.
    pub fn new(report: ErrorReport) -> Self {
        QueuedReport {
            report,
            timestamp: Utc::now(),
            attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crumb(n: usize) -> Breadcrumb {
        Breadcrumb::new(format!("event {}", n), "test", BreadcrumbLevel::Info)
    }

    #[test]
    fn test_trail_evicts_oldest_first() {
        let mut trail = BreadcrumbTrail::new(3);
        for n in 0..5 {
            trail.push(crumb(n));
        }
        assert_eq!(trail.len(), 3);
        let snapshot = trail.snapshot();
        assert_eq!(snapshot[0].message, "event 2");
        assert_eq!(snapshot[2].message, "event 4");
    }

    #[test]
    fn test_trail_zero_capacity_holds_nothing() {
        let mut trail = BreadcrumbTrail::new(0);
        trail.push(crumb(0));
        assert!(trail.is_empty());
    }

    #[test]
    fn test_trail_shrink_capacity_trims() {
        let mut trail = BreadcrumbTrail::new(5);
        for n in 0..5 {
            trail.push(crumb(n));
        }
        trail.set_capacity(2);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.snapshot()[0].message, "event 3");
    }

    #[test]
    fn test_trail_clear() {
        let mut trail = BreadcrumbTrail::new(5);
        trail.push(crumb(0));
        trail.clear();
        assert!(trail.is_empty());
    }

    #[test]
    fn test_from_anyhow_preserves_cause_chain() {
        let root = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer hung up");
        let error = anyhow::Error::from(root).context("fetching profile failed");

        let captured = CapturedError::from_anyhow(&error);
        assert_eq!(captured.message, "fetching profile failed");
        let stack = captured.stack.expect("cause chain should become the stack");
        assert!(stack.contains("peer hung up"));
    }

    #[test]
    fn test_breadcrumb_level_serializes_lowercase() {
        let crumb = Breadcrumb::new("clicked", "ui", BreadcrumbLevel::Warning);
        let json = serde_json::to_value(&crumb).unwrap();
        assert_eq!(json["level"], "warning");
    }

    #[test]
    fn test_queued_report_roundtrip() {
        let report = ErrorReport {
            message: "boom".to_string(),
            stack: None,
            error_type: "TestError".to_string(),
            environment: "test".to_string(),
            project_token: "prj_4f8a2c9d1e".to_string(),
            context: ReportContext {
                url: None,
                user_agent: None,
                timestamp: Utc::now(),
                user_id: None,
                user_email: None,
                custom_data: None,
                breadcrumbs: vec![],
            },
        };
        let queued = QueuedReport::new(report);
        let json = serde_json::to_string(&queued).unwrap();
        let back: QueuedReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.report.message, "boom");
        assert_eq!(back.attempts, 0);
    }
}
