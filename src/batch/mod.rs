//! Report batching.
//!
//! Accumulates validated reports so several ride one network call.
//! A batch flushes immediately when it reaches the configured count or
//! serialized size; otherwise a one-shot timer makes sure a partial
//! batch is never held indefinitely.

use std::mem;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error_handling::SendError;
use crate::report::ErrorReport;

/// Injected "send one batch" function; the orchestrator supplies the
/// gated delivery path so this component never touches the network
/// directly.
pub type BatchSendFn =
    Arc<dyn Fn(Vec<ErrorReport>) -> BoxFuture<'static, Result<(), SendError>> + Send + Sync>;

/// Batching triggers.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Report count that fires an immediate flush.
    pub batch_size: usize,
    /// Longest a partial batch is held.
    pub batch_timeout: std::time::Duration,
    /// Serialized batch size that fires an immediate flush.
    pub max_payload_size: usize,
}

/// Read-only snapshot of batching activity.
#[derive(Debug, Clone)]
pub struct BatchStats {
    /// Batches delivered.
    pub total_batches: u64,
    /// Reports delivered across all batches.
    pub total_errors: u64,
    /// Running mean reports per delivered batch.
    pub average_batch_size: f64,
    /// When the last batch was delivered.
    pub last_sent_at: Option<DateTime<Utc>>,
    /// Flushes whose send function returned an error.
    pub failed_flushes: u64,
    /// Reports currently buffered.
    pub pending: usize,
}

#[derive(Default)]
struct StatsInner {
    total_batches: u64,
    total_errors: u64,
    average_batch_size: f64,
    last_sent_at: Option<DateTime<Utc>>,
    failed_flushes: u64,
}

/// Accumulates reports and hands full batches to the injected sender.
pub struct BatchManager {
    settings: Mutex<BatchSettings>,
    buffer: Mutex<Vec<ErrorReport>>,
    stats: Mutex<StatsInner>,
    timer: Mutex<Option<CancellationToken>>,
    send_fn: BatchSendFn,
}

impl BatchManager {
    /// Creates a manager around the injected send function.
    pub fn new(settings: BatchSettings, send_fn: BatchSendFn) -> Arc<Self> {
        Arc::new(BatchManager {
            settings: Mutex::new(settings),
            buffer: Mutex::new(Vec::new()),
            stats: Mutex::new(StatsInner::default()),
            timer: Mutex::new(None),
            send_fn,
        })
    }

    /// Appends a report and flushes if either trigger fires; otherwise
    /// arms the batch timeout so the report is not held indefinitely.
    ///
    /// A flush error propagates to the caller; the batch contents are
    /// not re-queued here (the offline path one layer up owns that).
    pub async fn add_to_batch(self: &Arc<Self>, report: ErrorReport) -> Result<(), SendError> {
        let should_flush = {
            let settings = self.lock_settings().clone();
            let mut buffer = self.lock_buffer();
            buffer.push(report);
            let serialized = serde_json::to_vec(&*buffer).map(|v| v.len()).unwrap_or(0);
            buffer.len() >= settings.batch_size || serialized >= settings.max_payload_size
        };

        if should_flush {
            self.flush().await
        } else {
            self.arm_timer();
            Ok(())
        }
    }

    /// Delivers the current batch, if any.
    ///
    /// The in-memory buffer is cleared before the send begins, so a
    /// failed flush cannot duplicate reports into the next batch.
    /// A no-op when the buffer is empty.
    pub async fn flush(&self) -> Result<(), SendError> {
        if let Some(token) = self.lock_timer().take() {
            token.cancel();
        }

        let batch = mem::take(&mut *self.lock_buffer());
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        log::debug!("Flushing batch of {} reports", count);
        let result = (self.send_fn)(batch).await;

        let mut stats = self.lock_stats();
        match &result {
            Ok(()) => {
                stats.total_batches += 1;
                stats.total_errors += count as u64;
                let n = stats.total_batches as f64;
                stats.average_batch_size += (count as f64 - stats.average_batch_size) / n;
                stats.last_sent_at = Some(Utc::now());
            }
            Err(e) => {
                stats.failed_flushes += 1;
                log::warn!("Batch flush of {} reports failed: {}", count, e);
            }
        }

        result
    }

    /// Arms the one-shot batch timeout unless one is already pending.
    fn arm_timer(self: &Arc<Self>) {
        let timeout = self.lock_settings().batch_timeout;
        let mut slot = self.lock_timer();
        if slot.is_some() {
            return;
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());
        drop(slot);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    manager.lock_timer().take();
                    if let Err(e) = manager.flush().await {
                        log::warn!("Timed batch flush failed: {}", e);
                    }
                }
                _ = token.cancelled() => {}
            }
        });
    }

    /// Cancels any pending batch timeout (shutdown path).
    pub fn cancel_timer(&self) {
        if let Some(token) = self.lock_timer().take() {
            token.cancel();
        }
    }

    /// Reports currently buffered.
    pub fn pending(&self) -> usize {
        self.lock_buffer().len()
    }

    /// Snapshot of batching activity.
    pub fn stats(&self) -> BatchStats {
        let stats = self.lock_stats();
        BatchStats {
            total_batches: stats.total_batches,
            total_errors: stats.total_errors,
            average_batch_size: stats.average_batch_size,
            last_sent_at: stats.last_sent_at,
            failed_flushes: stats.failed_flushes,
            pending: self.lock_buffer().len(),
        }
    }

    /// Applies new triggers to subsequent batches.
    pub fn reconfigure(&self, settings: BatchSettings) {
        *self.lock_settings() = settings;
    }

    fn lock_settings(&self) -> std::sync::MutexGuard<'_, BatchSettings> {
        self.settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, Vec<ErrorReport>> {
        self.buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, StatsInner> {
        self.stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.timer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
