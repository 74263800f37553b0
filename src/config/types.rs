//! Reporter configuration types.
//!
//! [`ReporterConfig`] is a plain struct with explicit defaults; partial
//! runtime updates go through [`ConfigUpdate`], which enumerates every
//! recognized option so a merge can never silently ignore a key.

use std::path::PathBuf;
use std::time::Duration;

use super::constants::*;

/// Configuration for the error reporter.
///
/// Construct with struct-update syntax over [`Default`]:
///
/// ```
/// use error_relay::ReporterConfig;
///
/// let config = ReporterConfig {
///     api_url: "https://collector.example.com".to_string(),
///     project_token: "prj_4f8a2c9d1e".to_string(),
///     environment: "production".to_string(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Base URL of the collector; reports POST to `{api_url}/webhook`.
    pub api_url: String,

    /// Project token identifying this application to the collector.
    pub project_token: String,

    /// Deployment environment name (e.g. "production", "staging").
    pub environment: String,

    /// Master switch; when false every report is a no-op.
    pub enabled: bool,

    /// Emit verbose pipeline logging.
    pub debug: bool,

    /// Commit hash stamped into outbound payloads, if known.
    pub commit_hash: Option<String>,

    /// Breadcrumb trail capacity.
    pub max_breadcrumbs: usize,

    /// Reports admitted per fixed one-minute window.
    pub max_requests_per_minute: u32,

    /// Suppression window for duplicate error fingerprints.
    pub duplicate_error_window: Duration,

    /// Additional retry attempts after the initial delivery attempt.
    pub max_retries: usize,

    /// Delay before the first retry.
    pub initial_retry_delay: Duration,

    /// Ceiling on the backoff delay.
    pub max_retry_delay: Duration,

    /// Park undeliverable reports in the offline queue.
    pub enable_offline_support: bool,

    /// Offline queue capacity (FIFO eviction beyond this).
    pub max_offline_queue_size: usize,

    /// Age past which queued reports are discarded.
    pub offline_queue_max_age: Duration,

    /// SQLite file backing the offline queue and quota usage.
    ///
    /// `None` keeps all state in memory; nothing survives a restart.
    pub offline_store_path: Option<PathBuf>,

    /// Accumulate reports into batched sends.
    pub enable_batching: bool,

    /// Reports per batch before an immediate flush.
    pub batch_size: usize,

    /// Longest a partial batch is held before flushing.
    pub batch_timeout: Duration,

    /// Ceiling on a serialized payload (single report or whole batch).
    pub max_payload_size: usize,

    /// Compress payloads above the threshold.
    pub enable_compression: bool,

    /// Serialized size above which payloads are compressed.
    pub compression_threshold: usize,

    /// Deflate compression level (0-9).
    pub compression_level: u32,

    /// Gate sends through the circuit breaker.
    pub enable_circuit_breaker: bool,

    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before allowing a trial.
    pub circuit_breaker_timeout: Duration,

    /// Hosts the collector URL may resolve to; empty allows any public host.
    ///
    /// Entries are exact hostnames or `*.suffix` wildcards.
    pub allowed_domains: Vec<String>,

    /// Reject non-HTTPS collector URLs.
    pub require_https: bool,

    /// Per-request timeout for collector calls.
    pub request_timeout: Duration,

    /// Reports admitted per burst window.
    pub burst_limit: u64,

    /// Span of the rolling burst window.
    pub burst_window: Duration,

    /// Reports admitted per local calendar day.
    pub daily_limit: u64,

    /// Reports admitted per calendar month.
    pub monthly_limit: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            project_token: String::new(),
            environment: "production".to_string(),
            enabled: true,
            debug: false,
            commit_hash: None,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            duplicate_error_window: DEFAULT_DUPLICATE_ERROR_WINDOW,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_retry_delay: DEFAULT_INITIAL_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            enable_offline_support: true,
            max_offline_queue_size: DEFAULT_MAX_OFFLINE_QUEUE_SIZE,
            offline_queue_max_age: DEFAULT_OFFLINE_QUEUE_MAX_AGE,
            offline_store_path: None,
            enable_batching: false,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            enable_compression: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            enable_circuit_breaker: true,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            circuit_breaker_timeout: DEFAULT_CIRCUIT_BREAKER_TIMEOUT,
            allowed_domains: Vec::new(),
            require_https: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            burst_limit: DEFAULT_BURST_LIMIT,
            burst_window: DEFAULT_BURST_WINDOW,
            daily_limit: DEFAULT_DAILY_LIMIT,
            monthly_limit: DEFAULT_MONTHLY_LIMIT,
        }
    }
}

impl ReporterConfig {
    /// True when the environment string denotes a production deployment.
    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Applies a partial update, returning `true` when the collector
    /// destination (URL or token) changed and must be re-validated.
    pub fn apply_update(&mut self, update: ConfigUpdate) -> bool {
        let mut destination_changed = false;

        if let Some(api_url) = update.api_url {
            if api_url != self.api_url {
                destination_changed = true;
            }
            self.api_url = api_url;
        }
        if let Some(project_token) = update.project_token {
            if project_token != self.project_token {
                destination_changed = true;
            }
            self.project_token = project_token;
        }
        if let Some(environment) = update.environment {
            self.environment = environment;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(debug) = update.debug {
            self.debug = debug;
        }
        if let Some(commit_hash) = update.commit_hash {
            self.commit_hash = commit_hash;
        }
        if let Some(max_breadcrumbs) = update.max_breadcrumbs {
            self.max_breadcrumbs = max_breadcrumbs;
        }
        if let Some(max_requests_per_minute) = update.max_requests_per_minute {
            self.max_requests_per_minute = max_requests_per_minute;
        }
        if let Some(duplicate_error_window) = update.duplicate_error_window {
            self.duplicate_error_window = duplicate_error_window;
        }
        if let Some(max_retries) = update.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(initial_retry_delay) = update.initial_retry_delay {
            self.initial_retry_delay = initial_retry_delay;
        }
        if let Some(max_retry_delay) = update.max_retry_delay {
            self.max_retry_delay = max_retry_delay;
        }
        if let Some(enable_offline_support) = update.enable_offline_support {
            self.enable_offline_support = enable_offline_support;
        }
        if let Some(max_offline_queue_size) = update.max_offline_queue_size {
            self.max_offline_queue_size = max_offline_queue_size;
        }
        if let Some(offline_queue_max_age) = update.offline_queue_max_age {
            self.offline_queue_max_age = offline_queue_max_age;
        }
        if let Some(enable_batching) = update.enable_batching {
            self.enable_batching = enable_batching;
        }
        if let Some(batch_size) = update.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(batch_timeout) = update.batch_timeout {
            self.batch_timeout = batch_timeout;
        }
        if let Some(max_payload_size) = update.max_payload_size {
            self.max_payload_size = max_payload_size;
        }
        if let Some(enable_compression) = update.enable_compression {
            self.enable_compression = enable_compression;
        }
        if let Some(compression_threshold) = update.compression_threshold {
            self.compression_threshold = compression_threshold;
        }
        if let Some(compression_level) = update.compression_level {
            self.compression_level = compression_level;
        }
        if let Some(enable_circuit_breaker) = update.enable_circuit_breaker {
            self.enable_circuit_breaker = enable_circuit_breaker;
        }
        if let Some(failure_threshold) = update.failure_threshold {
            self.failure_threshold = failure_threshold;
        }
        if let Some(circuit_breaker_timeout) = update.circuit_breaker_timeout {
            self.circuit_breaker_timeout = circuit_breaker_timeout;
        }
        if let Some(allowed_domains) = update.allowed_domains {
            self.allowed_domains = allowed_domains;
        }
        if let Some(require_https) = update.require_https {
            self.require_https = require_https;
        }
        if let Some(request_timeout) = update.request_timeout {
            self.request_timeout = request_timeout;
        }
        if let Some(burst_limit) = update.burst_limit {
            self.burst_limit = burst_limit;
        }
        if let Some(burst_window) = update.burst_window {
            self.burst_window = burst_window;
        }
        if let Some(daily_limit) = update.daily_limit {
            self.daily_limit = daily_limit;
        }
        if let Some(monthly_limit) = update.monthly_limit {
            self.monthly_limit = monthly_limit;
        }

        destination_changed
    }
}

/// Partial configuration update; `None` fields keep their current value.
///
/// `commit_hash` is doubly optional so an update can explicitly clear it.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    /// New collector base URL.
    pub api_url: Option<String>,
    /// New project token.
    pub project_token: Option<String>,
    /// New environment name.
    pub environment: Option<String>,
    /// Enable or disable reporting.
    pub enabled: Option<bool>,
    /// Toggle verbose logging.
    pub debug: Option<bool>,
    /// Set or clear the commit hash.
    pub commit_hash: Option<Option<String>>,
    /// New breadcrumb capacity.
    pub max_breadcrumbs: Option<usize>,
    /// New per-minute request cap.
    pub max_requests_per_minute: Option<u32>,
    /// New duplicate suppression window.
    pub duplicate_error_window: Option<Duration>,
    /// New retry attempt cap.
    pub max_retries: Option<usize>,
    /// New first-retry delay.
    pub initial_retry_delay: Option<Duration>,
    /// New backoff delay ceiling.
    pub max_retry_delay: Option<Duration>,
    /// Toggle offline queueing.
    pub enable_offline_support: Option<bool>,
    /// New offline queue capacity.
    pub max_offline_queue_size: Option<usize>,
    /// New offline entry age limit.
    pub offline_queue_max_age: Option<Duration>,
    /// Toggle batching.
    pub enable_batching: Option<bool>,
    /// New batch size trigger.
    pub batch_size: Option<usize>,
    /// New partial-batch hold time.
    pub batch_timeout: Option<Duration>,
    /// New payload size ceiling.
    pub max_payload_size: Option<usize>,
    /// Toggle compression.
    pub enable_compression: Option<bool>,
    /// New compression threshold.
    pub compression_threshold: Option<usize>,
    /// New compression level.
    pub compression_level: Option<u32>,
    /// Toggle the circuit breaker.
    pub enable_circuit_breaker: Option<bool>,
    /// New circuit failure threshold.
    pub failure_threshold: Option<u32>,
    /// New open-circuit cooldown.
    pub circuit_breaker_timeout: Option<Duration>,
    /// New host allow-list.
    pub allowed_domains: Option<Vec<String>>,
    /// Toggle the HTTPS requirement.
    pub require_https: Option<bool>,
    /// New per-request timeout.
    pub request_timeout: Option<Duration>,
    /// New burst budget.
    pub burst_limit: Option<u64>,
    /// New burst window span.
    pub burst_window: Option<Duration>,
    /// New daily budget.
    pub daily_limit: Option<u64>,
    /// New monthly budget.
    pub monthly_limit: Option<u64>,
}
