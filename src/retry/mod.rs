//! Delivery retry with exponential backoff and jitter.
//!
//! Wraps a single delivery attempt in a bounded retry loop. Failures are
//! classified first: auth rejections and circuit-open refusals are
//! terminal, everything else is assumed transient and retried.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::config::{RETRY_BACKOFF_FACTOR, RETRY_JITTER_MS};
use crate::error_handling::SendError;

/// Backoff parameters for one retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the initial one.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the backoff delay (jitter excluded).
    pub max_delay: Duration,
}

/// Runs operations through a classified, jittered exponential backoff.
///
/// Per-operation attempt counters are keyed by caller-supplied id (a
/// random id is generated when omitted) and cleared once the operation
/// resolves, successfully or not. Retries for one id are strictly
/// sequential; operations under different ids proceed independently.
pub struct RetryManager {
    policy: Mutex<RetryPolicy>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl RetryManager {
    /// Creates a manager with the given backoff policy.
    pub fn new(policy: RetryPolicy) -> Self {
        RetryManager {
            policy: Mutex::new(policy),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the backoff policy for subsequent operations.
    pub fn reconfigure(&self, policy: RetryPolicy) {
        *self
            .policy
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = policy;
    }

    /// Invokes `operation` until it succeeds, fails terminally, or the
    /// retry budget is exhausted; the final error propagates unchanged.
    ///
    /// Delay before retry *n* (0-indexed) is
    /// `min(initial_delay * 2^n, max_delay)` plus up to one second of
    /// random jitter so synchronized clients do not stampede a
    /// recovering backend.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        operation_id: Option<&str>,
        mut operation: F,
    ) -> Result<T, SendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SendError>>,
    {
        let id = operation_id
            .map(str::to_owned)
            .unwrap_or_else(generate_operation_id);
        let policy = self
            .policy
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        let attempts = &self.attempts;
        let result = RetryIf::spawn(
            backoff_delays(&policy),
            || {
                let mut map = attempts
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                let count = map.entry(id.clone()).or_insert(0);
                *count += 1;
                if *count > 1 {
                    log::debug!("Retrying operation '{}' (attempt {})", id, count);
                }
                drop(map);
                operation()
            },
            |error: &SendError| Self::is_retryable(error),
        )
        .await;

        // Counter is cleared on success and on final failure alike
        attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&id);

        result
    }

    /// Classifies a delivery failure as transient or terminal.
    ///
    /// Terminal: HTTP 401/403 (and responses whose body says
    /// unauthorized/forbidden through a proxy that rewrote the code),
    /// circuit-open rejections (the breaker owns its own retry timing),
    /// and payload validation/serialization failures. Everything else
    /// (5xx, 429, 408, timeouts, network errors, the unclassified) is
    /// retried by default.
    pub fn is_retryable(error: &SendError) -> bool {
        match error {
            SendError::Http { status, reason } => {
                if matches!(status, 401 | 403) {
                    return false;
                }
                let reason = reason.to_lowercase();
                !(reason.contains("unauthorized") || reason.contains("forbidden"))
            }
            SendError::Timeout | SendError::Network(_) => true,
            SendError::CircuitOpen => false,
            SendError::Validation(_) | SendError::Serialize(_) => false,
        }
    }

    /// In-flight attempt count for an operation id (0 once resolved).
    pub fn attempts_in_flight(&self, operation_id: &str) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(operation_id)
            .copied()
            .unwrap_or(0)
    }
}

/// Backoff delay sequence for one retry loop.
///
/// `from_millis(base).factor(initial/base)` makes the first delay equal
/// to `initial_delay` with the delay doubling each attempt, capped at
/// `max_delay`; jitter is added on top of the cap.
fn backoff_delays(policy: &RetryPolicy) -> impl Iterator<Item = Duration> {
    let initial_ms = (policy.initial_delay.as_millis() as u64).max(1);
    ExponentialBackoff::from_millis(RETRY_BACKOFF_FACTOR)
        .factor((initial_ms / RETRY_BACKOFF_FACTOR).max(1))
        .max_delay(policy.max_delay)
        .take(policy.max_retries)
        .map(|delay| delay + Duration::from_millis(rand::rng().random_range(0..RETRY_JITTER_MS)))
}

/// Random id for operations the caller did not name.
fn generate_operation_id() -> String {
    format!("op-{:08x}", rand::rng().random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
        }
    }

    fn transient_error() -> SendError {
        SendError::Http {
            status: 503,
            reason: "service unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_invokes_once() {
        let manager = RetryManager::new(fast_policy(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = manager
            .execute_with_retry(Some("op"), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SendError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.attempts_in_flight("op"), 0);
    }

    #[tokio::test]
    async fn test_failing_max_retries_then_succeeding_resolves() {
        let manager = RetryManager::new(fast_policy(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = manager
            .execute_with_retry(Some("op"), || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(transient_error())
                    } else {
                        Ok("delivered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "delivered");
        // Initial attempt + exactly max_retries retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_never_succeeding_operation_exhausts_budget() {
        let manager = RetryManager::new(fast_policy(2));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = manager
            .execute_with_retry(Some("op"), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(transient_error()) }
            })
            .await;

        assert!(matches!(
            result,
            Err(SendError::Http { status: 503, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.attempts_in_flight("op"), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_failure_is_never_retried() {
        let manager = RetryManager::new(fast_policy(5));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = manager
            .execute_with_retry(Some("op"), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(SendError::Http {
                        status: 401,
                        reason: "unauthorized".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_circuit_open_is_never_retried() {
        let manager = RetryManager::new(fast_policy(5));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = manager
            .execute_with_retry(None, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(SendError::CircuitOpen) }
            })
            .await;

        assert!(matches!(result, Err(SendError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classification() {
        let retryable = [
            SendError::Http {
                status: 500,
                reason: "internal".into(),
            },
            SendError::Http {
                status: 429,
                reason: "rate limit".into(),
            },
            SendError::Http {
                status: 408,
                reason: "request timeout".into(),
            },
            SendError::Timeout,
            SendError::Network("connection reset".into()),
        ];
        for error in &retryable {
            assert!(RetryManager::is_retryable(error), "{:?}", error);
        }

        let terminal = [
            SendError::Http {
                status: 401,
                reason: "unauthorized".into(),
            },
            SendError::Http {
                status: 403,
                reason: "forbidden".into(),
            },
            SendError::Http {
                status: 200,
                reason: "Forbidden by policy".into(),
            },
            SendError::CircuitOpen,
        ];
        for error in &terminal {
            assert!(!RetryManager::is_retryable(error), "{:?}", error);
        }
    }

    #[test]
    fn test_backoff_delays_grow_and_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        let delays: Vec<Duration> = backoff_delays(&policy).collect();
        assert_eq!(delays.len(), 5);

        // Jitter adds at most RETRY_JITTER_MS on top of the deterministic
        // schedule 100, 200, 350 (capped), 350, 350
        let jitter = Duration::from_millis(RETRY_JITTER_MS);
        assert!(delays[0] >= Duration::from_millis(100) && delays[0] < Duration::from_millis(100) + jitter);
        assert!(delays[1] >= Duration::from_millis(200) && delays[1] < Duration::from_millis(200) + jitter);
        for delay in &delays[2..] {
            assert!(*delay >= Duration::from_millis(350) && *delay < Duration::from_millis(350) + jitter);
        }
    }

    #[test]
    fn test_generated_operation_ids_are_distinct() {
        let a = generate_operation_id();
        let b = generate_operation_id();
        assert!(a.starts_with("op-"));
        assert_ne!(a, b);
    }
}
