//! Sliding-window rate limiting
//!
//! A per-key sliding window of permit timestamps, pruned lazily on access.
//! There is no background sweeper: correctness never depends on a periodic
//! task, and the window is small (tens of entries) so a full prune per check
//! is O(window size).
//!
//! Callers supply `now` from their own clock handle, which keeps the limiter
//! deterministic under test clocks and free of ambient time access.
//!
//! Contention is isolated per key: the registry lock is held only long
//! enough to fetch or create a window handle; the check itself runs under
//! that window's own mutex.

use crate::time::{durations, PhysicalTime};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Sliding-window parameters for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Maximum permits per key within any window; zero always denies
    pub max_count: u32,
}

impl RateLimitConfig {
    /// Magic-link issuance: 3 links per address per 10 minutes.
    pub fn magic_link() -> Self {
        Self {
            window_ms: 10 * durations::MINUTE_MS,
            max_count: 3,
        }
    }

    /// Resource creation: 5 creations per principal per hour.
    pub fn resource_creation() -> Self {
        Self {
            window_ms: durations::HOUR_MS,
            max_count: 5,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::magic_link()
    }
}

type Window = Arc<Mutex<VecDeque<u64>>>;

/// Sliding-window counter keyed by an arbitrary string (email digest, IP,
/// principal). Shared across call sites by handle; one limiter instance is
/// created at process start and injected wherever a gate is needed.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: RwLock<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the window for `key` and record a permit if allowed.
    ///
    /// Prunes entries older than `now - window`, denies without recording if
    /// the remaining count has reached `max_count`, otherwise appends `now`
    /// and allows. A `max_count` of zero always denies.
    pub fn check_and_record(&self, key: &str, config: RateLimitConfig, now: PhysicalTime) -> bool {
        if config.max_count == 0 {
            tracing::warn!(key, "rate limit misconfigured with max_count=0, denying");
            return false;
        }

        let window = self.window_handle(key);
        let mut entries = window.lock();
        Self::prune(&mut entries, config.window_ms, now);

        if entries.len() >= config.max_count as usize {
            tracing::debug!(key, count = entries.len(), "rate limit denied");
            return false;
        }

        entries.push_back(now.ts_ms);
        true
    }

    /// Number of live (unpruned) permits recorded for `key`, as of `now`.
    pub fn window_len(&self, key: &str, config: RateLimitConfig, now: PhysicalTime) -> usize {
        let guard = self.windows.read();
        match guard.get(key) {
            Some(window) => {
                let mut entries = window.lock();
                Self::prune(&mut entries, config.window_ms, now);
                entries.len()
            }
            None => 0,
        }
    }

    /// Optional compaction: drop windows whose every entry has aged out.
    ///
    /// Never required for correctness — pruning on access already bounds
    /// each window — this only reclaims map entries for keys that went
    /// idle. A window some checker currently holds a handle to is left in
    /// place: removing it would detach that checker's append, and the next
    /// check for the key would start from a fresh window and admit one
    /// permit too many.
    pub fn compact(&self, window_ms: u64, now: PhysicalTime) {
        let mut guard = self.windows.write();
        guard.retain(|_, window| {
            // The registry write lock blocks new handle fetches, so a
            // strong count above one means a checker is mid-flight.
            if Arc::strong_count(window) > 1 {
                return true;
            }
            let mut entries = window.lock();
            Self::prune(&mut entries, window_ms, now);
            !entries.is_empty()
        });
    }

    fn window_handle(&self, key: &str) -> Window {
        if let Some(window) = self.windows.read().get(key) {
            return Arc::clone(window);
        }
        let mut guard = self.windows.write();
        Arc::clone(guard.entry(key.to_string()).or_default())
    }

    fn prune(entries: &mut VecDeque<u64>, window_ms: u64, now: PhysicalTime) {
        let cutoff = now.ts_ms.saturating_sub(window_ms);
        while let Some(&oldest) = entries.front() {
            if oldest > cutoff {
                break;
            }
            entries.pop_front();
        }
    }
}
