//! Default values for the reporter configuration.

use std::time::Duration;

/// SDK version stamped into every outbound payload.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path appended to the collector base URL for report submission.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Rate-limit key used when the caller does not supply one.
pub const DEFAULT_RATE_LIMIT_KEY: &str = "default";

/// Maximum breadcrumbs retained per report.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 50;

/// Maximum reports admitted per rate-limit window.
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 10;

/// Span of the fixed rate-limit window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Window during which an identical error fingerprint is suppressed.
pub const DEFAULT_DUPLICATE_ERROR_WINDOW: Duration = Duration::from_secs(60);

/// Interval between periodic rate-limiter cleanup passes.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Additional retry attempts after the initial delivery attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Ceiling on the backoff delay.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Multiplier applied to the retry delay after each attempt.
pub const RETRY_BACKOFF_FACTOR: u64 = 2;

/// Upper bound (exclusive) of the random jitter added to each retry delay.
pub const RETRY_JITTER_MS: u64 = 1000;

/// Maximum entries held in the offline queue.
pub const DEFAULT_MAX_OFFLINE_QUEUE_SIZE: usize = 50;

/// Age past which a queued report is discarded instead of replayed.
pub const DEFAULT_OFFLINE_QUEUE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Replay attempts before a queued report is dropped.
pub const OFFLINE_MAX_REPLAY_ATTEMPTS: u32 = 3;

/// Reports accumulated before a batch is flushed.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Longest a partial batch is held before flushing.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Ceiling on a serialized payload (single report or whole batch).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 512 * 1024;

/// Serialized size above which payloads are compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Deflate compression level (0-9).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Consecutive failures before the circuit breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit rejects calls before allowing a trial.
pub const DEFAULT_CIRCUIT_BREAKER_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-request timeout for collector calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Reports admitted per burst window.
pub const DEFAULT_BURST_LIMIT: u64 = 10;

/// Span of the rolling burst window.
pub const DEFAULT_BURST_WINDOW: Duration = Duration::from_secs(60);

/// Reports admitted per local calendar day.
pub const DEFAULT_DAILY_LIMIT: u64 = 1000;

/// Reports admitted per calendar month.
pub const DEFAULT_MONTHLY_LIMIT: u64 = 10_000;

/// Number of leading stack frames folded into the error fingerprint.
pub const FINGERPRINT_STACK_FRAMES: usize = 3;

/// Message prefix length folded into the error fingerprint.
pub const FINGERPRINT_MESSAGE_LENGTH: usize = 100;

/// Maximum recursion depth of the data sanitizer.
pub const MAX_SANITIZE_DEPTH: usize = 10;

/// Minimum accepted project token length.
pub const MIN_TOKEN_LENGTH: usize = 8;
