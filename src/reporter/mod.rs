//! The reporting orchestrator.
//!
//! [`ErrorReporter`] owns the configuration and wires every subsystem
//! into one pipeline per report: fingerprint → rate-limit/dedup gate →
//! quota gate → (batch admission) → sanitize and size-validate →
//! compress → circuit-breaker-gated send with retry → offline queue on
//! exhaustion. Delivery failures never escape the report entry points;
//! the statistics surface is the only witness.

mod transport;

pub use transport::Transport;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchManager, BatchSendFn, BatchSettings, BatchStats};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerStats};
use crate::compression::{CompressionService, CompressionSettings, CompressionStats};
use crate::config::{
    ConfigUpdate, ReporterConfig, CLEANUP_INTERVAL, DEFAULT_RATE_LIMIT_KEY,
    OFFLINE_MAX_REPLAY_ATTEMPTS, RATE_LIMIT_WINDOW,
};
use crate::error_handling::{
    ConfigError, DropReason, ReporterStats, SendError, StatsSnapshot, ValidationError,
};
use crate::offline::{OfflineManager, OfflineSettings, ReportSendFn};
use crate::quota::{QuotaConstraint, QuotaLimits, QuotaManager, QuotaOutlook, QuotaUsage};
use crate::rate_limit::{create_fingerprint, RateLimiter};
use crate::report::{
    Breadcrumb, BreadcrumbTrail, CapturedError, ErrorReport, ReportContext, WirePayload,
};
use crate::retry::{RetryManager, RetryPolicy};
use crate::security::{sanitize_data, scrub_text, SecurityValidator};
use crate::storage::StateStore;

/// What happened to a submitted report.
///
/// Delivery-layer failures are resolved internally; this value is the
/// caller's only signal, alongside the statistics surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Delivered to the collector.
    Sent,
    /// Admitted to the batch buffer; a later flush delivers it.
    Batched,
    /// Parked in the offline queue for replay.
    Queued,
    /// Dropped without delivery.
    Dropped {
        /// Why the report was dropped.
        reason: DropReason,
        /// When the violated budget resets, for quota drops.
        retry_after: Option<Duration>,
    },
    /// Reporting is disabled by configuration.
    Disabled,
}

/// Application-assigned user identity attached to reports.
#[derive(Debug, Clone, Default)]
struct UserInfo {
    id: Option<String>,
    email: Option<String>,
}

/// Ambient session detail fed by out-of-scope adapters.
#[derive(Debug, Clone, Default)]
struct SessionInfo {
    url: Option<String>,
    user_agent: Option<String>,
}

/// Everything one delivery needs, cheap to clone into send closures.
#[derive(Clone)]
struct DeliveryHandle {
    config: Arc<Mutex<ReporterConfig>>,
    transport: Arc<Transport>,
    breaker: Arc<CircuitBreaker>,
    retry: Arc<RetryManager>,
    compression: Arc<CompressionService>,
    quota: Arc<QuotaManager>,
    stats: Arc<ReporterStats>,
}

/// The delivery engine: one instance per application, owned explicitly
/// and shared by handle (`Arc`) with whatever captures errors.
pub struct ErrorReporter {
    config: Arc<Mutex<ReporterConfig>>,
    rate_limiter: Arc<RateLimiter>,
    retry: Arc<RetryManager>,
    breaker: Arc<CircuitBreaker>,
    quota: Arc<QuotaManager>,
    compression: Arc<CompressionService>,
    batch: Arc<BatchManager>,
    offline: Arc<OfflineManager>,
    stats: Arc<ReporterStats>,
    send_one: ReportSendFn,
    breadcrumbs: Mutex<BreadcrumbTrail>,
    user: Mutex<UserInfo>,
    session: Mutex<SessionInfo>,
    custom_context: Mutex<serde_json::Map<String, Value>>,
    store: Option<Arc<StateStore>>,
    cleanup: CancellationToken,
}

impl ErrorReporter {
    /// Constructs the engine, validating the destination eagerly.
    ///
    /// An invalid collector URL or project token fails fast here; a
    /// misconfigured reporter must never silently swallow reports.
    /// A store that fails to open degrades to in-memory operation
    /// (logged, not fatal).
    pub async fn new(config: ReporterConfig) -> Result<Arc<Self>, ConfigError> {
        let validator = SecurityValidator::from_config(&config);
        validator
            .validate_api_url(&config.api_url)
            .map_err(ConfigError::InvalidUrl)?;
        validator
            .validate_project_token(&config.project_token)
            .map_err(ConfigError::InvalidToken)?;

        let store = match &config.offline_store_path {
            Some(path) => match StateStore::open(path).await {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    log::warn!(
                        "Failed to open offline store at {}, running in-memory only: {}",
                        path.display(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let stats = Arc::new(ReporterStats::new());
        let rate_limiter = Arc::new(RateLimiter::new(
            config.max_requests_per_minute,
            RATE_LIMIT_WINDOW,
            config.duplicate_error_window,
        ));
        let retry = Arc::new(RetryManager::new(RetryPolicy {
            max_retries: config.max_retries,
            initial_delay: config.initial_retry_delay,
            max_delay: config.max_retry_delay,
        }));
        let breaker = Arc::new(CircuitBreaker::new(
            config.failure_threshold,
            config.circuit_breaker_timeout,
        ));
        let compression = Arc::new(CompressionService::new(CompressionSettings {
            threshold: config.compression_threshold,
            level: config.compression_level,
        }));
        let quota = Arc::new(
            QuotaManager::load(quota_limits(&config), store.clone()).await,
        );

        let max_breadcrumbs = config.max_breadcrumbs;
        let offline_settings = OfflineSettings {
            max_queue_size: config.max_offline_queue_size,
            max_age: config.offline_queue_max_age,
            max_replay_attempts: OFFLINE_MAX_REPLAY_ATTEMPTS,
        };
        let batch_settings = BatchSettings {
            batch_size: config.batch_size,
            batch_timeout: config.batch_timeout,
            max_payload_size: config.max_payload_size,
        };

        let config = Arc::new(Mutex::new(config));
        let transport = Arc::new(Transport::new(Arc::clone(&config))?);

        let handle = DeliveryHandle {
            config: Arc::clone(&config),
            transport,
            breaker: Arc::clone(&breaker),
            retry: Arc::clone(&retry),
            compression: Arc::clone(&compression),
            quota: Arc::clone(&quota),
            stats: Arc::clone(&stats),
        };

        let send_handle = handle.clone();
        let send_one: ReportSendFn = Arc::new(move |report| {
            let handle = send_handle.clone();
            async move { deliver_single(handle, report).await }.boxed()
        });

        let offline = Arc::new(
            OfflineManager::load(
                offline_settings,
                store.clone(),
                Arc::clone(&send_one),
                Arc::clone(&stats),
            )
            .await,
        );

        let batch_handle = handle.clone();
        let offline_for_batch = Arc::clone(&offline);
        let batch_send: BatchSendFn = Arc::new(move |reports| {
            let handle = batch_handle.clone();
            let offline = Arc::clone(&offline_for_batch);
            async move { deliver_batch_or_queue(handle, offline, reports).await }.boxed()
        });
        let batch = BatchManager::new(batch_settings, batch_send);

        let cleanup = CancellationToken::new();
        spawn_cleanup_task(Arc::clone(&rate_limiter), cleanup.clone());

        Ok(Arc::new(ErrorReporter {
            config,
            rate_limiter,
            retry,
            breaker,
            quota,
            compression,
            batch,
            offline,
            stats,
            send_one,
            breadcrumbs: Mutex::new(BreadcrumbTrail::new(max_breadcrumbs)),
            user: Mutex::new(UserInfo::default()),
            session: Mutex::new(SessionInfo::default()),
            custom_context: Mutex::new(serde_json::Map::new()),
            store,
            cleanup,
        }))
    }

    /// Reports a captured error through the full pipeline.
    ///
    /// Never fails for delivery-layer reasons; the returned outcome says
    /// what the engine did with the report.
    pub async fn report_error(
        &self,
        error: CapturedError,
        additional_data: Option<Value>,
    ) -> ReportOutcome {
        let snapshot = self.config_snapshot();
        if !snapshot.enabled {
            return ReportOutcome::Disabled;
        }
        self.stats.record_captured();

        let fingerprint = create_fingerprint(&error, additional_data.as_ref());

        if !self.rate_limiter.can_make_request(DEFAULT_RATE_LIMIT_KEY) {
            if snapshot.debug {
                log::debug!("Report dropped: rate limit window exhausted");
            }
            self.stats.record_drop(DropReason::RateLimited);
            return ReportOutcome::Dropped {
                reason: DropReason::RateLimited,
                retry_after: None,
            };
        }

        if !self.rate_limiter.can_report_error(&fingerprint) {
            if snapshot.debug {
                log::debug!("Report dropped: duplicate fingerprint {}", fingerprint);
            }
            self.stats.record_drop(DropReason::DuplicateError);
            return ReportOutcome::Dropped {
                reason: DropReason::DuplicateError,
                retry_after: None,
            };
        }

        let report = self.build_report(error, additional_data, &snapshot);
        let size = report.serialized_size();

        let decision = self.quota.can_send_error(size);
        if !decision.allowed {
            let reason = match decision.constraint {
                Some(QuotaConstraint::Daily) => DropReason::DailyQuotaExceeded,
                Some(QuotaConstraint::Monthly) => DropReason::MonthlyQuotaExceeded,
                Some(QuotaConstraint::Burst) => DropReason::BurstQuotaExceeded,
                Some(QuotaConstraint::PayloadSize) => DropReason::PayloadTooLarge,
                None => DropReason::InvalidPayload,
            };
            log::warn!(
                "Report dropped: {}",
                decision.reason.as_deref().unwrap_or("quota exceeded")
            );
            self.stats.record_drop(reason);
            return ReportOutcome::Dropped {
                reason,
                retry_after: decision.retry_after,
            };
        }

        // Known-offline: park the report without burning a network attempt
        if snapshot.enable_offline_support && !self.offline.is_online() {
            if snapshot.debug {
                log::debug!("Offline, queueing report for replay");
            }
            self.offline.enqueue(report).await;
            return ReportOutcome::Queued;
        }

        if snapshot.enable_batching {
            // A flush error inside admission was already resolved by the
            // injected batch sender (drop or offline queue); the report
            // itself was admitted either way.
            if let Err(e) = self.batch.add_to_batch(report).await {
                log::debug!("Batch flush during admission failed: {}", e);
            }
            self.stats.record_batched();
            return ReportOutcome::Batched;
        }

        match (self.send_one)(report.clone()).await {
            Ok(()) => ReportOutcome::Sent,
            Err(SendError::Validation(v)) => {
                let reason = match v {
                    ValidationError::PayloadTooLarge { .. } => DropReason::PayloadTooLarge,
                    _ => DropReason::InvalidPayload,
                };
                log::warn!("Report dropped: {}", v);
                self.stats.record_drop(reason);
                ReportOutcome::Dropped {
                    reason,
                    retry_after: None,
                }
            }
            Err(e) => {
                if snapshot.enable_offline_support {
                    log::warn!("Delivery failed, queueing report offline: {}", e);
                    self.offline.enqueue(report).await;
                    ReportOutcome::Queued
                } else {
                    log::warn!("Delivery failed and offline support is disabled: {}", e);
                    self.stats.record_drop(DropReason::SendFailed);
                    ReportOutcome::Dropped {
                        reason: DropReason::SendFailed,
                        retry_after: None,
                    }
                }
            }
        }
    }

    /// Reports a plain message (no stack) through the same pipeline.
    pub async fn report_message(
        &self,
        message: impl Into<String>,
        additional_data: Option<Value>,
    ) -> ReportOutcome {
        self.report_error(CapturedError::new(message, "Message", None), additional_data)
            .await
    }

    /// Appends a breadcrumb to the trail.
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        self.lock_breadcrumbs().push(breadcrumb);
    }

    /// Clears the breadcrumb trail.
    pub fn clear_breadcrumbs(&self) {
        self.lock_breadcrumbs().clear();
    }

    /// Sets (or clears) the user identity attached to future reports.
    pub fn set_user(&self, id: Option<String>, email: Option<String>) {
        *self
            .user
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = UserInfo { id, email };
    }

    /// Sets ambient session detail (page URL, user agent).
    pub fn set_session_info(&self, url: Option<String>, user_agent: Option<String>) {
        *self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = SessionInfo { url, user_agent };
    }

    /// Merges one key into the custom context sent with every report.
    pub fn set_context(&self, key: impl Into<String>, value: Value) {
        self.custom_context
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Removes every custom context key.
    pub fn clear_context(&self) {
        self.custom_context
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Feeds a connectivity transition; replays the offline queue on the
    /// offline→online edge. Returns the number of reports delivered.
    pub async fn set_online(&self, online: bool) -> usize {
        if self.offline.set_online(online) {
            log::info!("Connectivity restored, replaying offline queue");
            self.offline.process_queue().await
        } else {
            0
        }
    }

    /// Manually replays the offline queue (no-op while offline).
    pub async fn process_offline_queue(&self) -> usize {
        self.offline.process_queue().await
    }

    /// Forces any pending batch out immediately.
    pub async fn flush(&self) -> Result<(), SendError> {
        self.batch.flush().await
    }

    /// Merges a partial configuration update.
    ///
    /// Validation is re-run only when the collector URL or project token
    /// changed; an invalid update is rejected wholesale, leaving the
    /// previous configuration in place.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<(), ConfigError> {
        let working = {
            let mut guard = self
                .config
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut working = guard.clone();
            let destination_changed = working.apply_update(update);

            if destination_changed {
                let validator = SecurityValidator::from_config(&working);
                validator
                    .validate_api_url(&working.api_url)
                    .map_err(ConfigError::InvalidUrl)?;
                validator
                    .validate_project_token(&working.project_token)
                    .map_err(ConfigError::InvalidToken)?;
                log::info!("Collector destination updated");
            }

            *guard = working.clone();
            working
        };

        // Push the merged parameters down into the components
        self.rate_limiter.reconfigure(
            working.max_requests_per_minute,
            working.duplicate_error_window,
        );
        self.retry.reconfigure(RetryPolicy {
            max_retries: working.max_retries,
            initial_delay: working.initial_retry_delay,
            max_delay: working.max_retry_delay,
        });
        self.breaker
            .reconfigure(working.failure_threshold, working.circuit_breaker_timeout);
        self.quota.reconfigure(quota_limits(&working));
        self.compression.reconfigure(CompressionSettings {
            threshold: working.compression_threshold,
            level: working.compression_level,
        });
        self.batch.reconfigure(BatchSettings {
            batch_size: working.batch_size,
            batch_timeout: working.batch_timeout,
            max_payload_size: working.max_payload_size,
        });
        self.offline.reconfigure(OfflineSettings {
            max_queue_size: working.max_offline_queue_size,
            max_age: working.offline_queue_max_age,
            max_replay_attempts: OFFLINE_MAX_REPLAY_ATTEMPTS,
        });
        self.lock_breadcrumbs().set_capacity(working.max_breadcrumbs);

        Ok(())
    }

    /// Clean shutdown: stops the periodic cleanup, flushes any pending
    /// batch, and releases the persisted store without discarding
    /// already-persisted state.
    pub async fn destroy(&self) {
        self.cleanup.cancel();
        self.batch.cancel_timer();
        if let Err(e) = self.batch.flush().await {
            log::warn!("Final batch flush failed: {}", e);
        }
        if let Some(store) = &self.store {
            store.close().await;
        }
        log::debug!("Error reporter shut down");
    }

    /// Pipeline counters snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Circuit breaker health.
    pub fn circuit_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats()
    }

    /// Batching activity.
    pub fn batch_stats(&self) -> BatchStats {
        self.batch.stats()
    }

    /// Compression activity.
    pub fn compression_stats(&self) -> CompressionStats {
        self.compression.stats()
    }

    /// Quota usage after lazy rollover.
    pub fn quota_usage(&self) -> QuotaUsage {
        self.quota.usage()
    }

    /// Per-window nearing-limit flags at `threshold` (0.0–1.0).
    pub fn quota_outlook(&self, threshold: f64) -> QuotaOutlook {
        self.quota.is_nearing_limit(threshold)
    }

    /// Zeroes the persisted quota counters.
    pub async fn reset_quota(&self) {
        self.quota.reset_usage().await;
    }

    /// Number of reports parked in the offline queue.
    pub fn offline_queue_size(&self) -> usize {
        self.offline.queue_size()
    }

    /// Connectivity as last reported.
    pub fn is_online(&self) -> bool {
        self.offline.is_online()
    }

    /// Copy of the active configuration.
    pub fn config(&self) -> ReporterConfig {
        self.config_snapshot()
    }

    /// Builds the immutable report from a captured error plus ambient
    /// context, sanitizing everything that leaves the process.
    fn build_report(
        &self,
        error: CapturedError,
        additional_data: Option<Value>,
        config: &ReporterConfig,
    ) -> ErrorReport {
        let user = self
            .user
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let session = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        // Custom context keys first, then per-report data over them
        let mut custom = self
            .custom_context
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        if let Some(additional) = additional_data {
            match additional {
                Value::Object(map) => custom.extend(map),
                other => {
                    custom.insert("additional_data".to_string(), other);
                }
            }
        }
        let custom_data = if custom.is_empty() {
            None
        } else {
            Some(sanitize_data(&Value::Object(custom)))
        };

        let breadcrumbs: Vec<Breadcrumb> = self
            .lock_breadcrumbs()
            .snapshot()
            .into_iter()
            .map(|mut crumb| {
                crumb.message = scrub_text(&crumb.message);
                crumb.data = crumb.data.as_ref().map(sanitize_data);
                crumb
            })
            .collect();

        ErrorReport {
            message: scrub_text(&error.message),
            stack: error.stack,
            error_type: error.type_name,
            environment: config.environment.clone(),
            project_token: config.project_token.clone(),
            context: ReportContext {
                url: session.url,
                user_agent: session.user_agent,
                timestamp: Utc::now(),
                user_id: user.id,
                user_email: user.email,
                custom_data,
                breadcrumbs,
            },
        }
    }

    fn config_snapshot(&self) -> ReporterConfig {
        self.config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn lock_breadcrumbs(&self) -> std::sync::MutexGuard<'_, BreadcrumbTrail> {
        self.breadcrumbs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn quota_limits(config: &ReporterConfig) -> QuotaLimits {
    QuotaLimits {
        burst_limit: config.burst_limit,
        burst_window: config.burst_window,
        daily_limit: config.daily_limit,
        monthly_limit: config.monthly_limit,
        max_payload_bytes: config.max_payload_size,
    }
}

/// Periodic rate-limiter cleanup, cancelled on shutdown.
fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, token: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        ticker.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => rate_limiter.cleanup(),
                _ = token.cancelled() => {
                    log::debug!("Cleanup task shutting down");
                    break;
                }
            }
        }
    });
}

/// Serializes a payload, enforces the size ceiling, and compresses when
/// worthwhile. Compression failures fall back to the uncompressed body
/// rather than failing the send.
fn encode_body<T: Serialize>(
    value: &T,
    config: &ReporterConfig,
    compression: &CompressionService,
) -> Result<String, SendError> {
    let serialized = serde_json::to_string(value)?;

    if serialized.len() > config.max_payload_size {
        return Err(SendError::Validation(ValidationError::PayloadTooLarge {
            size: serialized.len(),
            limit: config.max_payload_size,
        }));
    }

    if config.enable_compression
        && compression.is_supported()
        && compression.should_compress(serialized.as_bytes())
    {
        match compression.compress(serialized.as_bytes()) {
            Ok(encoded) => {
                let wrapper = serde_json::json!({
                    "compressed": true,
                    "payload": encoded,
                });
                return Ok(wrapper.to_string());
            }
            Err(e) => {
                log::warn!("Compression failed, sending uncompressed: {}", e);
            }
        }
    }

    Ok(serialized)
}

/// The gated send: retry loop around the circuit-breaker-wrapped POST.
///
/// The breaker sits inside the retry loop so an open circuit fails the
/// attempt immediately and the classifier stops the loop (the breaker
/// owns recovery timing, not the backoff schedule).
async fn send_gated(handle: &DeliveryHandle, body: String) -> Result<(), SendError> {
    let enable_breaker = {
        let config = handle
            .config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        config.enable_circuit_breaker
    };

    handle
        .retry
        .execute_with_retry(None, || {
            let transport = Arc::clone(&handle.transport);
            let breaker = Arc::clone(&handle.breaker);
            let body = body.clone();
            async move {
                if enable_breaker {
                    breaker
                        .execute(move || async move { transport.send_body(body).await })
                        .await
                } else {
                    transport.send_body(body).await
                }
            }
        })
        .await
}

/// Delivers one report; on success, quota usage and metrics advance.
async fn deliver_single(handle: DeliveryHandle, report: ErrorReport) -> Result<(), SendError> {
    let config = handle
        .config
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();

    let payload = WirePayload::from_report(&report, config.commit_hash.as_deref());
    let body = encode_body(&payload, &config, &handle.compression)?;
    let size = report.serialized_size();

    send_gated(&handle, body).await?;

    handle.quota.record_error_sent(size).await;
    handle.stats.record_sent();
    Ok(())
}

/// Delivers a whole batch in one call; on failure the reports fall back
/// to the offline queue (when enabled): the layer above the batch
/// buffer owns re-queueing, never the buffer itself.
async fn deliver_batch_or_queue(
    handle: DeliveryHandle,
    offline: Arc<OfflineManager>,
    reports: Vec<ErrorReport>,
) -> Result<(), SendError> {
    let config = handle
        .config
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone();

    let payloads: Vec<WirePayload> = reports
        .iter()
        .map(|report| WirePayload::from_report(report, config.commit_hash.as_deref()))
        .collect();

    let body = match encode_body(&payloads, &config, &handle.compression) {
        Ok(body) => body,
        Err(SendError::Validation(v)) => {
            // An oversized batch cannot be shipped; it is dropped and
            // counted, never re-queued.
            log::warn!("Dropping batch of {} reports: {}", reports.len(), v);
            for _ in &reports {
                handle.stats.record_drop(DropReason::PayloadTooLarge);
            }
            return Err(SendError::Validation(v));
        }
        Err(e) => return Err(e),
    };

    match send_gated(&handle, body).await {
        Ok(()) => {
            for report in &reports {
                handle.quota.record_error_sent(report.serialized_size()).await;
                handle.stats.record_sent();
            }
            Ok(())
        }
        Err(e) => {
            let offline_enabled = {
                let config = handle
                    .config
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                config.enable_offline_support
            };
            if offline_enabled {
                log::warn!(
                    "Batch delivery failed, queueing {} reports offline: {}",
                    reports.len(),
                    e
                );
                for report in reports {
                    offline.enqueue(report).await;
                }
                Ok(())
            } else {
                for _ in &reports {
                    handle.stats.record_drop(DropReason::SendFailed);
                }
                Err(e)
            }
        }
    }
}
