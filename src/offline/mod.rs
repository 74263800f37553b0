//! Offline queue.
//!
//! Reports that could not be delivered are parked here: a bounded,
//! age-evicting FIFO persisted through the state store and replayed
//! through the injected gated-send path when connectivity returns.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;

use crate::error_handling::{DropReason, ReporterStats, SendError};
use crate::report::{ErrorReport, QueuedReport};
use crate::storage::{StateStore, OFFLINE_QUEUE_NAMESPACE};

/// Injected "send one report" function supplied by the orchestrator;
/// replays go through the same circuit-breaker-gated path as live sends.
pub type ReportSendFn =
    Arc<dyn Fn(ErrorReport) -> BoxFuture<'static, Result<(), SendError>> + Send + Sync>;

/// Queue bounds.
#[derive(Debug, Clone)]
pub struct OfflineSettings {
    /// Maximum queued reports; the oldest is evicted beyond this.
    pub max_queue_size: usize,
    /// Age past which a queued report is discarded.
    pub max_age: Duration,
    /// Replay attempts before a queued report is dropped.
    pub max_replay_attempts: u32,
}

/// Bounded, persisted holding area for undelivered reports.
pub struct OfflineManager {
    settings: Mutex<OfflineSettings>,
    queue: Mutex<VecDeque<QueuedReport>>,
    online: AtomicBool,
    replaying: AtomicBool,
    store: Option<Arc<StateStore>>,
    send_fn: ReportSendFn,
    stats: Arc<ReporterStats>,
}

impl OfflineManager {
    /// Creates a manager, restoring any persisted queue.
    ///
    /// Missing or corrupt persisted state degrades to an empty queue.
    /// Starts online; connectivity adapters feed transitions through
    /// [`set_online`](Self::set_online).
    pub async fn load(
        settings: OfflineSettings,
        store: Option<Arc<StateStore>>,
        send_fn: ReportSendFn,
        stats: Arc<ReporterStats>,
    ) -> Self {
        let mut queue: VecDeque<QueuedReport> = match &store {
            Some(store) => store
                .load::<Vec<QueuedReport>>(OFFLINE_QUEUE_NAMESPACE)
                .await
                .map(VecDeque::from)
                .unwrap_or_default(),
            None => VecDeque::new(),
        };

        if !queue.is_empty() {
            log::info!("Restored {} queued reports from the offline store", queue.len());
        }
        purge_expired(&mut queue, settings.max_age, &stats);

        OfflineManager {
            settings: Mutex::new(settings),
            queue: Mutex::new(queue),
            online: AtomicBool::new(true),
            replaying: AtomicBool::new(false),
            store,
            send_fn,
            stats,
        }
    }

    /// Parks a report for later delivery.
    ///
    /// Over-age entries are purged first; beyond capacity the oldest
    /// entry is evicted (FIFO). The queue is persisted best-effort.
    pub async fn enqueue(&self, report: ErrorReport) {
        let snapshot = {
            let settings = self.lock_settings().clone();
            let mut queue = self.lock_queue();
            purge_expired(&mut queue, settings.max_age, &self.stats);

            queue.push_back(QueuedReport::new(report));
            while queue.len() > settings.max_queue_size {
                queue.pop_front();
                self.stats.record_drop(DropReason::QueueOverflow);
                log::warn!("Offline queue full, evicted oldest report");
            }
            queue.iter().cloned().collect::<Vec<_>>()
        };

        self.stats.record_queued();
        self.persist(&snapshot).await;
    }

    /// Replays queued reports through the injected send path.
    ///
    /// A no-op while offline (or while another replay pass is running).
    /// Stops at the first failure (the backend is evidently still
    /// unhealthy) after re-queueing the failed entry with its attempt
    /// count bumped, unless it exhausted its replay budget. Returns the
    /// number of reports delivered.
    pub async fn process_queue(&self) -> usize {
        if !self.is_online() {
            log::debug!("Offline queue: skipping replay while offline");
            return 0;
        }
        if self
            .replaying
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return 0;
        }

        let mut delivered = 0;
        loop {
            let next = {
                let settings = self.lock_settings().clone();
                let mut queue = self.lock_queue();
                purge_expired(&mut queue, settings.max_age, &self.stats);
                queue.pop_front()
            };

            let Some(mut entry) = next else { break };

            match (self.send_fn)(entry.report.clone()).await {
                Ok(()) => {
                    delivered += 1;
                    self.stats.record_replayed();
                }
                Err(e) => {
                    entry.attempts += 1;
                    let max_attempts = self.lock_settings().max_replay_attempts;
                    if entry.attempts > max_attempts {
                        self.stats.record_drop(DropReason::QueueRetriesExhausted);
                        log::warn!(
                            "Dropping queued report after {} replay attempts: {}",
                            entry.attempts,
                            e
                        );
                    } else {
                        log::debug!(
                            "Replay failed (attempt {}), keeping report queued: {}",
                            entry.attempts,
                            e
                        );
                        self.lock_queue().push_front(entry);
                    }
                    break;
                }
            }
        }

        let snapshot: Vec<QueuedReport> = self.lock_queue().iter().cloned().collect();
        self.persist(&snapshot).await;
        self.replaying.store(false, Ordering::SeqCst);

        if delivered > 0 {
            log::info!("Replayed {} queued reports", delivered);
        }
        delivered
    }

    /// Records a connectivity transition; returns `true` on the
    /// offline→online edge (the caller should trigger a replay).
    pub fn set_online(&self, online: bool) -> bool {
        let was = self.online.swap(online, Ordering::SeqCst);
        !was && online
    }

    /// Current connectivity as last reported.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of reports currently queued.
    pub fn queue_size(&self) -> usize {
        self.lock_queue().len()
    }

    /// Applies new bounds to subsequent operations.
    pub fn reconfigure(&self, settings: OfflineSettings) {
        *self.lock_settings() = settings;
    }

    async fn persist(&self, snapshot: &[QueuedReport]) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(OFFLINE_QUEUE_NAMESPACE, &snapshot).await {
                log::warn!("Failed to persist offline queue: {}", e);
            }
        }
    }

    fn lock_settings(&self) -> std::sync::MutexGuard<'_, OfflineSettings> {
        self.settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<QueuedReport>> {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Drops entries older than `max_age` from the queue front.
///
/// Entries are enqueued in time order, so the scan stops at the first
/// young-enough entry.
fn purge_expired(queue: &mut VecDeque<QueuedReport>, max_age: Duration, stats: &ReporterStats) {
    let now = Utc::now();
    while let Some(front) = queue.front() {
        let age = now
            .signed_duration_since(front.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age > max_age {
            queue.pop_front();
            stats.record_drop(DropReason::QueueExpired);
            log::debug!("Purged expired report from offline queue");
        } else {
            break;
        }
    }
}
