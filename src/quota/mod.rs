//! Multi-window send budgets.
//!
//! Three independent budgets gate every send: a short rolling burst
//! window, a daily budget resetting at local calendar midnight, and a
//! monthly budget resetting on the first of the month. Expired counters
//! roll over lazily on every query, not via a background timer that
//! would drift when the host sleeps, so each check resets before it
//! evaluates.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{StateStore, QUOTA_USAGE_NAMESPACE};

/// Persisted usage counters across all quota windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Reports sent since the last daily reset.
    pub daily_used: u64,
    /// Reports sent since the last monthly reset.
    pub monthly_used: u64,
    /// Reports sent in the current burst window.
    pub burst_used: u64,
    /// When the daily counter last rolled over.
    pub last_reset_daily: DateTime<Utc>,
    /// When the monthly counter last rolled over.
    pub last_reset_monthly: DateTime<Utc>,
    /// When the burst counter last rolled over.
    pub last_reset_burst: DateTime<Utc>,
    /// Cumulative payload bytes across the lifetime of the record.
    pub total_bytes_used: u64,
}

impl Default for QuotaUsage {
    fn default() -> Self {
        let now = Utc::now();
        QuotaUsage {
            daily_used: 0,
            monthly_used: 0,
            burst_used: 0,
            last_reset_daily: now,
            last_reset_monthly: now,
            last_reset_burst: now,
            total_bytes_used: 0,
        }
    }
}

/// Budget limits for the three windows plus the per-report size ceiling.
#[derive(Debug, Clone)]
pub struct QuotaLimits {
    /// Reports per burst window.
    pub burst_limit: u64,
    /// Span of the rolling burst window.
    pub burst_window: Duration,
    /// Reports per local calendar day.
    pub daily_limit: u64,
    /// Reports per calendar month.
    pub monthly_limit: u64,
    /// Largest serialized report admitted.
    pub max_payload_bytes: usize,
}

/// Which constraint a denied send tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaConstraint {
    /// The single-report size ceiling.
    PayloadSize,
    /// The daily budget.
    Daily,
    /// The monthly budget.
    Monthly,
    /// The burst budget.
    Burst,
}

/// Outcome of a quota check.
#[derive(Debug, Clone)]
pub struct QuotaDecision {
    /// Whether the send may proceed.
    pub allowed: bool,
    /// The first violated constraint, when denied.
    pub constraint: Option<QuotaConstraint>,
    /// Human-readable reason, when denied.
    pub reason: Option<String>,
    /// Time until the violated window resets, when denied.
    pub retry_after: Option<Duration>,
}

impl QuotaDecision {
    fn allow() -> Self {
        QuotaDecision {
            allowed: true,
            constraint: None,
            reason: None,
            retry_after: None,
        }
    }

    fn deny(constraint: QuotaConstraint, reason: String, retry_after: Option<Duration>) -> Self {
        QuotaDecision {
            allowed: false,
            constraint: Some(constraint),
            reason: Some(reason),
            retry_after,
        }
    }
}

/// Per-window flags for dashboarding; true when usage crossed the
/// warning threshold.
#[derive(Debug, Clone, Copy)]
pub struct QuotaOutlook {
    /// Daily budget nearing exhaustion.
    pub daily: bool,
    /// Monthly budget nearing exhaustion.
    pub monthly: bool,
    /// Burst budget nearing exhaustion.
    pub burst: bool,
}

struct QuotaState {
    limits: QuotaLimits,
    usage: QuotaUsage,
}

/// Enforces the three send budgets and persists usage across sessions.
pub struct QuotaManager {
    state: Mutex<QuotaState>,
    store: Option<Arc<StateStore>>,
}

impl QuotaManager {
    /// Creates a manager, restoring persisted usage when a store is
    /// available. Missing or corrupt state degrades to zeroed counters.
    pub async fn load(limits: QuotaLimits, store: Option<Arc<StateStore>>) -> Self {
        let usage = match &store {
            Some(store) => store
                .load::<QuotaUsage>(QUOTA_USAGE_NAMESPACE)
                .await
                .unwrap_or_default(),
            None => QuotaUsage::default(),
        };

        QuotaManager {
            state: Mutex::new(QuotaState { limits, usage }),
            store,
        }
    }

    /// Checks whether a report of `payload_size` bytes may be sent.
    ///
    /// Constraints are evaluated in order: payload size, daily, monthly,
    /// burst; the first violation wins and carries a `retry_after`
    /// computed from that window's next reset instant.
    pub fn can_send_error(&self, payload_size: usize) -> QuotaDecision {
        let mut guard = self.lock();
        let state = &mut *guard;
        reset_expired_counters(&mut state.usage, &state.limits);

        let limits = &state.limits;
        let usage = &state.usage;

        if payload_size > limits.max_payload_bytes {
            return QuotaDecision::deny(
                QuotaConstraint::PayloadSize,
                format!(
                    "Payload size {} bytes exceeds the {} byte limit",
                    payload_size, limits.max_payload_bytes
                ),
                None,
            );
        }

        if usage.daily_used >= limits.daily_limit {
            let now = Local::now();
            return QuotaDecision::deny(
                QuotaConstraint::Daily,
                format!("Daily limit of {} reports reached", limits.daily_limit),
                Some(until(next_local_midnight(now), now)),
            );
        }

        if usage.monthly_used >= limits.monthly_limit {
            let now = Local::now();
            return QuotaDecision::deny(
                QuotaConstraint::Monthly,
                format!("Monthly limit of {} reports reached", limits.monthly_limit),
                Some(until(next_month_start(now), now)),
            );
        }

        if usage.burst_used >= limits.burst_limit {
            let window_end = usage.last_reset_burst
                + chrono::Duration::from_std(limits.burst_window)
                    .unwrap_or_else(|_| chrono::Duration::seconds(60));
            let retry_after = (window_end - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            return QuotaDecision::deny(
                QuotaConstraint::Burst,
                format!("Burst limit of {} reports reached", limits.burst_limit),
                Some(retry_after),
            );
        }

        QuotaDecision::allow()
    }

    /// Records an accepted send: all three counters and the byte total
    /// advance in one critical section, then the record is persisted
    /// best-effort.
    pub async fn record_error_sent(&self, payload_size: usize) {
        let snapshot = {
            let mut guard = self.lock();
            let state = &mut *guard;
            reset_expired_counters(&mut state.usage, &state.limits);
            state.usage.daily_used += 1;
            state.usage.monthly_used += 1;
            state.usage.burst_used += 1;
            state.usage.total_bytes_used += payload_size as u64;
            state.usage.clone()
        };
        self.persist(&snapshot).await;
    }

    /// Reports which windows have crossed `threshold` (0.0–1.0) of
    /// their budget.
    pub fn is_nearing_limit(&self, threshold: f64) -> QuotaOutlook {
        let mut guard = self.lock();
        let state = &mut *guard;
        reset_expired_counters(&mut state.usage, &state.limits);

        let ratio = |used: u64, limit: u64| {
            if limit == 0 {
                true
            } else {
                used as f64 / limit as f64 >= threshold
            }
        };

        QuotaOutlook {
            daily: ratio(state.usage.daily_used, state.limits.daily_limit),
            monthly: ratio(state.usage.monthly_used, state.limits.monthly_limit),
            burst: ratio(state.usage.burst_used, state.limits.burst_limit),
        }
    }

    /// Zeroes every counter and the byte total, then persists.
    pub async fn reset_usage(&self) {
        let snapshot = {
            let mut state = self.lock();
            state.usage = QuotaUsage::default();
            state.usage.clone()
        };
        self.persist(&snapshot).await;
    }

    /// Current usage after lazy rollover.
    pub fn usage(&self) -> QuotaUsage {
        let mut guard = self.lock();
        let state = &mut *guard;
        reset_expired_counters(&mut state.usage, &state.limits);
        state.usage.clone()
    }

    /// Applies new limits to subsequent checks.
    pub fn reconfigure(&self, limits: QuotaLimits) {
        self.lock().limits = limits;
    }

    async fn persist(&self, usage: &QuotaUsage) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(QUOTA_USAGE_NAMESPACE, usage).await {
                log::warn!("Failed to persist quota usage: {}", e);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QuotaState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Rolls over any window whose boundary has passed. Runs before every
/// evaluation so the counters are always current.
fn reset_expired_counters(usage: &mut QuotaUsage, limits: &QuotaLimits) {
    let now_utc = Utc::now();
    let now_local = Local::now();

    // Burst: elapsed-time based
    let elapsed = now_utc.signed_duration_since(usage.last_reset_burst);
    let expired = elapsed < chrono::Duration::zero()
        || elapsed.to_std().map(|d| d >= limits.burst_window).unwrap_or(true);
    if expired {
        usage.burst_used = 0;
        usage.last_reset_burst = now_utc;
    }

    // Daily: local calendar midnight
    let last_daily_local = usage.last_reset_daily.with_timezone(&Local);
    if last_daily_local.date_naive() != now_local.date_naive() {
        log::debug!("Quota: daily counter rolled over");
        usage.daily_used = 0;
        usage.last_reset_daily = now_utc;
    }

    // Monthly: first of month
    let last_monthly_local = usage.last_reset_monthly.with_timezone(&Local);
    if (last_monthly_local.year(), last_monthly_local.month())
        != (now_local.year(), now_local.month())
    {
        log::debug!("Quota: monthly counter rolled over");
        usage.monthly_used = 0;
        usage.last_reset_monthly = now_utc;
    }
}

fn until(later: DateTime<Local>, now: DateTime<Local>) -> Duration {
    (later - now).to_std().unwrap_or(Duration::ZERO)
}

/// Next local midnight after `now`; falls back to now + 24h if the
/// calendar math lands in a DST gap.
fn next_local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    let tomorrow = match now.date_naive().succ_opt() {
        Some(date) => date,
        None => return now + chrono::Duration::hours(24),
    };
    tomorrow
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .unwrap_or(now + chrono::Duration::hours(24))
}

/// First instant of the next calendar month in local time.
fn next_month_start(now: DateTime<Local>) -> DateTime<Local> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    chrono::NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .unwrap_or(now + chrono::Duration::days(28))
}
