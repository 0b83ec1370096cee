//! Fixed-window rate limit record.

use std::time::Duration;

/// Request count for one key inside one fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Requests observed in the current window
    pub count: u64,
    /// Epoch milliseconds at which the current window expires
    pub reset_at_ms: u64,
}

impl RateLimitRecord {
    /// Open a new window at `now_ms` containing a single request.
    pub fn open(now_ms: u64, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at_ms: now_ms.saturating_add(window.as_millis() as u64),
        }
    }

    /// Whether the window has ended at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_at_ms
    }

    /// Record one request at `now_ms`.
    ///
    /// An expired window is replaced by a fresh one; otherwise the count is
    /// incremented, even past the limit.
    pub fn hit(&mut self, now_ms: u64, window: Duration) {
        if self.is_expired(now_ms) {
            *self = Self::open(now_ms, window);
        } else {
            self.count = self.count.saturating_add(1);
        }
    }

    /// Milliseconds until the window resets.
    pub fn millis_until_reset(&self, now_ms: u64) -> u64 {
        self.reset_at_ms.saturating_sub(now_ms)
    }

    /// Whole seconds a rejected client should wait, rounded up.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.millis_until_reset(now_ms).div_ceil(1000)
    }
}
