//! Circuit breaker for collector health.
//!
//! Prevents resource exhaustion when the collector fails repeatedly.
//! After N consecutive failures the circuit opens and sends fail fast
//! until a cooldown expires, after which a single trial call probes
//! whether the backend recovered.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error_handling::SendError;

/// Health state of the collector as seen by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow; failures are counted.
    Closed,
    /// Calls are rejected until the cooldown expires.
    Open,
    /// One trial call is probing the backend.
    HalfOpen,
}

impl CircuitState {
    /// Returns a human-readable state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

/// Read-only snapshot of breaker health.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,
    /// Lifetime successes since the last reset.
    pub successes: u64,
    /// Lifetime failures since the last reset.
    pub failures: u64,
    /// Lifetime failure rate since the last reset.
    pub failure_rate: f64,
    /// Time until an open circuit admits a trial, if open.
    pub retry_in: Option<Duration>,
}

struct BreakerInner {
    state: CircuitState,
    failure_threshold: u32,
    timeout: Duration,
    consecutive_failures: u32,
    successes: u64,
    failures: u64,
    next_retry_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Fail-fast gate in front of the collector.
///
/// State transitions happen atomically under one lock, so two interleaved
/// callers can never both claim the half-open trial slot.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// `failure_threshold` consecutive failures open the circuit;
    /// `timeout` is the cooldown before a trial call is admitted.
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        CircuitBreaker {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_threshold,
                timeout,
                consecutive_failures: 0,
                successes: 0,
                failures: 0,
                next_retry_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Whether a call would currently be admitted.
    ///
    /// Checking does not claim the trial slot; `execute` does.
    pub fn is_call_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => match inner.next_retry_at {
                Some(at) => Instant::now() >= at,
                None => true,
            },
            CircuitState::HalfOpen => !inner.trial_in_flight,
        }
    }

    /// Runs `operation` through the breaker.
    ///
    /// Rejects with [`SendError::CircuitOpen`] without invoking the
    /// operation when the circuit is open (or a trial is already in
    /// flight), otherwise awaits it and records the outcome.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, SendError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SendError>>,
    {
        if !self.try_acquire() {
            return Err(SendError::CircuitOpen);
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(error)
            }
        }
    }

    /// Claims the right to make a call, transitioning `Open → HalfOpen`
    /// when the cooldown has expired. Returns false when the call must
    /// fail fast.
    fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let expired = inner.next_retry_at.map(|at| now >= at).unwrap_or(true);
                if expired {
                    // First caller after the cooldown becomes the trial
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    log::info!("Circuit breaker: cooldown expired, admitting trial call");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // A second caller during the trial stays gated
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        inner.successes += 1;
        inner.consecutive_failures = 0;
        inner.trial_in_flight = false;
        if inner.state != CircuitState::Closed {
            log::info!("Circuit breaker: closing after successful call");
            inner.state = CircuitState::Closed;
            inner.next_retry_at = None;
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        inner.consecutive_failures += 1;
        inner.trial_in_flight = false;

        match inner.state {
            CircuitState::HalfOpen => {
                // Trial failed, back to open with a fresh cooldown
                inner.state = CircuitState::Open;
                inner.next_retry_at = Some(Instant::now() + inner.timeout);
                log::warn!(
                    "Circuit breaker: trial call failed, reopening for {}s",
                    inner.timeout.as_secs()
                );
            }
            CircuitState::Closed if inner.consecutive_failures >= inner.failure_threshold => {
                inner.state = CircuitState::Open;
                inner.next_retry_at = Some(Instant::now() + inner.timeout);
                log::error!(
                    "Circuit breaker: opened after {} consecutive failures (cooldown: {}s)",
                    inner.consecutive_failures,
                    inner.timeout.as_secs()
                );
            }
            _ => {}
        }
    }

    /// Forces the circuit open, rejecting calls until the cooldown expires.
    pub fn force_open(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Open;
        inner.next_retry_at = Some(Instant::now() + inner.timeout);
        inner.trial_in_flight = false;
        log::warn!("Circuit breaker: forced open");
    }

    /// Forces the circuit closed without touching lifetime counters.
    pub fn force_close(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.next_retry_at = None;
        inner.trial_in_flight = false;
        log::info!("Circuit breaker: forced closed");
    }

    /// Resets state and every counter to a fresh closed breaker.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.successes = 0;
        inner.failures = 0;
        inner.next_retry_at = None;
        inner.trial_in_flight = false;
    }

    /// Applies a new threshold and cooldown to future transitions.
    pub fn reconfigure(&self, failure_threshold: u32, timeout: Duration) {
        let mut inner = self.lock();
        inner.failure_threshold = failure_threshold;
        inner.timeout = timeout;
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Lifetime failure rate since the last reset (0.0 when idle).
    pub fn failure_rate(&self) -> f64 {
        let inner = self.lock();
        let total = inner.successes + inner.failures;
        if total == 0 {
            0.0
        } else {
            inner.failures as f64 / total as f64
        }
    }

    /// Snapshot of breaker health.
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.lock();
        let total = inner.successes + inner.failures;
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            successes: inner.successes,
            failures: inner.failures,
            failure_rate: if total == 0 {
                0.0
            } else {
                inner.failures as f64 / total as f64
            },
            retry_in: inner
                .next_retry_at
                .map(|at| at.saturating_duration_since(Instant::now())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
