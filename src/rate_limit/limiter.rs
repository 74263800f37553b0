//! Fixed-window rate limiter with duplicate-error suppression.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Counter state for one rate-limit key.
#[derive(Debug)]
struct RequestWindow {
    count: u32,
    reset_at: Instant,
}

struct LimiterInner {
    max_requests: u32,
    duplicate_window: Duration,
    windows: HashMap<String, RequestWindow>,
    fingerprints: HashMap<String, Instant>,
}

/// Throttles inbound reports before any network or storage work happens.
///
/// Two independent gates:
/// - a fixed-window counter per key (`can_make_request`), and
/// - a per-fingerprint suppression window (`can_report_error`).
///
/// Both gates mutate their counters synchronously under a short lock, so
/// two interleaved callers can never both pass a gate meant to admit one.
/// None of these operations can fail.
pub struct RateLimiter {
    window: Duration,
    inner: Mutex<LimiterInner>,
}

impl RateLimiter {
    /// Creates a limiter admitting `max_requests` per `window` per key.
    pub fn new(max_requests: u32, window: Duration, duplicate_window: Duration) -> Self {
        RateLimiter {
            window,
            inner: Mutex::new(LimiterInner {
                max_requests,
                duplicate_window,
                windows: HashMap::new(),
                fingerprints: HashMap::new(),
            }),
        }
    }

    /// Admits a request under `key` if the current window has room.
    ///
    /// A new window starts lazily on the first call after expiry.
    /// `max_requests == 0` always denies.
    pub fn can_make_request(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.max_requests == 0 {
            return false;
        }

        let now = Instant::now();
        let window = self.window;
        let max_requests = inner.max_requests;
        let entry = inner
            .windows
            .entry(key.to_string())
            .or_insert_with(|| RequestWindow {
                count: 0,
                reset_at: now + window,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        if entry.count < max_requests {
            entry.count += 1;
            true
        } else {
            false
        }
    }

    /// Admits an error fingerprint at most once per duplicate window.
    ///
    /// Records the acceptance timestamp so an identical error seen again
    /// within the window is suppressed.
    pub fn can_report_error(&self, fingerprint: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        let duplicate_window = inner.duplicate_window;

        match inner.fingerprints.get(fingerprint) {
            Some(&seen) if now.duration_since(seen) < duplicate_window => false,
            _ => {
                inner.fingerprints.insert(fingerprint.to_string(), now);
                true
            }
        }
    }

    /// Purges expired windows and stale fingerprints.
    ///
    /// Intended to run from a periodic timer rather than per request, so
    /// memory stays bounded even when traffic stops.
    pub fn cleanup(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        let duplicate_window = inner.duplicate_window;

        inner.windows.retain(|_, w| now < w.reset_at);
        inner
            .fingerprints
            .retain(|_, &mut seen| now.duration_since(seen) < duplicate_window);
    }

    /// Applies new limits; existing window counters keep running.
    pub fn reconfigure(&self, max_requests: u32, duplicate_window: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.max_requests = max_requests;
        inner.duplicate_window = duplicate_window;
    }

    /// Number of live window entries (monitoring aid).
    pub fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .windows
            .len()
    }

    /// Number of remembered fingerprints (monitoring aid).
    pub fn tracked_fingerprints(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .fingerprints
            .len()
    }
}
