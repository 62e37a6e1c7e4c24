//! Fixed-window request rate limiting.
//!
//! One counter per `(identifier, minute)`; the counter key rolls over at
//! minute boundaries, which permits a short 2x burst across a boundary, an
//! accepted trade for the simplicity of atomic increment-and-expire.
//! A failing counter store never blocks a request: the limiter fails open on
//! the side of availability.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::StoreError;

/// Counter store with fixed-window semantics: increment the key and return
/// the new count. Entries expire with their window.
pub trait RateStore: Send + Sync {
    fn increment(&self, key: &str, window_epoch: u64) -> Result<u64, StoreError>;
}

/// In-process counter store. Keeps only the current window per identifier;
/// stale windows are dropped on first touch.
#[derive(Default)]
pub struct MemoryRateStore {
    counters: Mutex<HashMap<String, (u64, u64)>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateStore for MemoryRateStore {
    fn increment(&self, key: &str, window_epoch: u64) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let entry = counters.entry(key.to_string()).or_insert((0, window_epoch));
        if entry.1 != window_epoch {
            *entry = (0, window_epoch);
        }
        entry.0 += 1;
        Ok(entry.0)
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limited: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Epoch second at which the current window resets.
    pub reset_epoch_secs: u64,
    /// Seconds the client should wait when limited.
    pub retry_after_secs: u64,
}

/// Per-identifier fixed-window limiter.
pub struct RateLimiter<S> {
    store: S,
    limit_per_minute: u64,
}

impl<S: RateStore> RateLimiter<S> {
    pub fn new(store: S, limit_per_minute: u64) -> Self {
        Self {
            store,
            limit_per_minute,
        }
    }

    /// Admission check for `identifier` at the current wall-clock time.
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.check_at(identifier, now)
    }

    /// Admission check at an explicit epoch second (test seam).
    pub fn check_at(&self, identifier: &str, epoch_secs: u64) -> RateLimitDecision {
        let minute = epoch_secs / 60;
        let reset_epoch_secs = (minute + 1) * 60;
        let key = format!("rate:{identifier}:{minute}");

        let count = match self.store.increment(&key, minute) {
            Ok(count) => count,
            Err(err) => {
                // Availability over enforcement: a broken counter store must
                // not take the whole ingress down with it.
                tracing::warn!(error = %err, "rate store unavailable, admitting request");
                return RateLimitDecision {
                    limited: false,
                    limit: self.limit_per_minute,
                    remaining: self.limit_per_minute,
                    reset_epoch_secs,
                    retry_after_secs: 0,
                };
            }
        };

        let limited = count > self.limit_per_minute;
        RateLimitDecision {
            limited,
            limit: self.limit_per_minute,
            remaining: self.limit_per_minute.saturating_sub(count),
            reset_epoch_secs,
            retry_after_secs: if limited {
                reset_epoch_secs.saturating_sub(epoch_secs)
            } else {
                0
            },
        }
    }
}
