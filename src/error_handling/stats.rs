//! Reporting statistics tracking.
//!
//! Delivery failures are silent by design; this statistics surface is the
//! only observability into what the engine dropped and why.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::DropReason;

/// Thread-safe counters for the reporting pipeline.
///
/// Tracks captured, sent, batched, and queued reports plus a per-reason
/// drop counter. All counters use atomics so the stats can be shared
/// across tasks with `Arc` and read without locking.
pub struct ReporterStats {
    captured: AtomicUsize,
    sent: AtomicUsize,
    batched: AtomicUsize,
    queued: AtomicUsize,
    replayed: AtomicUsize,
    drops: HashMap<DropReason, AtomicUsize>,
}

/// Point-in-time copy of [`ReporterStats`], cheap to serialize and compare.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatsSnapshot {
    /// Reports accepted into the pipeline (post-enabled check).
    pub captured: usize,
    /// Reports confirmed delivered to the collector.
    pub sent: usize,
    /// Reports handed to the batch buffer.
    pub batched: usize,
    /// Reports parked in the offline queue.
    pub queued: usize,
    /// Reports delivered from the offline queue on replay.
    pub replayed: usize,
    /// Total dropped reports across all reasons.
    pub total_dropped: usize,
    /// Dropped reports per human-readable reason.
    pub dropped: HashMap<String, usize>,
}

impl ReporterStats {
    /// Creates a zeroed statistics tracker with every drop reason present.
    pub fn new() -> Self {
        let mut drops = HashMap::new();
        for reason in DropReason::iter() {
            drops.insert(reason, AtomicUsize::new(0));
        }

        ReporterStats {
            captured: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
            batched: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            replayed: AtomicUsize::new(0),
            drops,
        }
    }

    /// Counts a report entering the pipeline.
    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a confirmed delivery.
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a report admitted to the batch buffer.
    pub fn record_batched(&self) {
        self.batched.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a report parked in the offline queue.
    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a successful offline replay.
    pub fn record_replayed(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a dropped report.
    ///
    /// Every drop reason is initialized in the constructor; a missing
    /// counter indicates an initialization bug, which is logged rather
    /// than panicking so the application keeps running.
    pub fn record_drop(&self, reason: DropReason) {
        if let Some(counter) = self.drops.get(&reason) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment drop counter for {:?} which is not in the map. \
                 This indicates a bug in ReporterStats initialization.",
                reason
            );
        }
    }

    /// Returns the drop count for one reason.
    pub fn drop_count(&self, reason: DropReason) -> usize {
        self.drops
            .get(&reason)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Returns the total drop count across all reasons.
    pub fn total_dropped(&self) -> usize {
        DropReason::iter().map(|r| self.drop_count(r)).sum()
    }

    /// Returns the number of confirmed deliveries.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Returns the number of captured reports.
    pub fn captured(&self) -> usize {
        self.captured.load(Ordering::SeqCst)
    }

    /// Returns the number of reports parked offline.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Takes a point-in-time snapshot of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut dropped = HashMap::new();
        for reason in DropReason::iter() {
            let count = self.drop_count(reason);
            if count > 0 {
                dropped.insert(reason.as_str().to_string(), count);
            }
        }

        StatsSnapshot {
            captured: self.captured.load(Ordering::SeqCst),
            sent: self.sent.load(Ordering::SeqCst),
            batched: self.batched.load(Ordering::SeqCst),
            queued: self.queued.load(Ordering::SeqCst),
            replayed: self.replayed.load(Ordering::SeqCst),
            total_dropped: self.total_dropped(),
            dropped,
        }
    }
}

impl Default for ReporterStats {
    fn default() -> Self {
        Self::new()
    }
}
