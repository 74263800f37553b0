//! error_relay: resilient delivery engine for client-side error reporting.
//!
//! For every captured error or message, the engine decides whether, when,
//! and how to transmit it to a remote collector under constraints of
//! rate, quota, connectivity, payload size, and backend health. The
//! pipeline: deduplication/rate limiting → quota accounting → optional
//! batching → sanitization and size validation → optional compression →
//! circuit-breaker-gated send with retry → persisted offline queue with
//! replay on reconnect.
//!
//! # Example
//!
//! ```no_run
//! use error_relay::{CapturedError, ErrorReporter, ReporterConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reporter = ErrorReporter::new(ReporterConfig {
//!     api_url: "https://errors.example.com".to_string(),
//!     project_token: "prj_4f8a2c9d1e".to_string(),
//!     environment: "production".to_string(),
//!     ..Default::default()
//! })
//! .await?;
//!
//! let outcome = reporter
//!     .report_error(
//!         CapturedError::new("checkout failed", "OrderError", None),
//!         None,
//!     )
//!     .await;
//! println!("report outcome: {:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an
//! async context.
//!
//! Delivery failures are silent by design: the report entry points
//! return an outcome value, never an error, and the statistics surface
//! is the observability into drops and failures. Only configuration
//! errors (bad collector URL or token) surface as `Result::Err`.

#![warn(missing_docs)]

pub mod batch;
pub mod circuit_breaker;
pub mod compression;
pub mod config;
pub mod error_handling;
pub mod offline;
pub mod quota;
pub mod rate_limit;
pub mod report;
pub mod reporter;
pub mod retry;
pub mod security;
pub mod storage;

// Re-export public API
pub use config::{ConfigUpdate, ReporterConfig};
pub use error_handling::{
    CompressionError, ConfigError, DropReason, PersistenceError, SendError, StatsSnapshot,
    ValidationError,
};
pub use report::{Breadcrumb, BreadcrumbLevel, CapturedError, ErrorReport};
pub use reporter::{ErrorReporter, ReportOutcome};
pub use retry::{RetryManager, RetryPolicy};
