//! Core rate limiter implementation.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::key::RateLimitKey;
use super::rules::RuleSet;
use super::store::RateLimitStore;

/// Outcome of a rate limit check for a protected path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request is admitted
    Admit {
        /// Limit for the matched rule
        limit: u64,
        /// Requests left in the current window
        remaining: u64,
        /// Epoch milliseconds at which the window resets
        reset_at_ms: u64,
    },
    /// Request exceeds the limit
    Reject {
        /// Limit for the matched rule
        limit: u64,
        /// Epoch milliseconds at which the window resets
        reset_at_ms: u64,
        /// Seconds until the client may retry, rounded up
        retry_after_secs: u64,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    /// Limit for the matched rule.
    pub fn limit(&self) -> u64 {
        match *self {
            Decision::Admit { limit, .. } | Decision::Reject { limit, .. } => limit,
        }
    }

    /// Requests left in the current window (zero when rejected).
    pub fn remaining(&self) -> u64 {
        match *self {
            Decision::Admit { remaining, .. } => remaining,
            Decision::Reject { .. } => 0,
        }
    }

    /// Epoch milliseconds at which the window resets.
    pub fn reset_at_ms(&self) -> u64 {
        match *self {
            Decision::Admit { reset_at_ms, .. } | Decision::Reject { reset_at_ms, .. } => {
                reset_at_ms
            }
        }
    }
}

/// The core rate limiter.
///
/// This struct is thread-safe and can be shared across request handlers
/// behind an `Arc`. The record store, rule set and clock are all owned by the
/// limiter, so independent instances never share state.
pub struct RateLimiter {
    /// Current window records
    store: RateLimitStore,
    /// Active rules; swapped whole on reload
    rules: RwLock<Arc<RuleSet>>,
    /// Time source
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter reading the system clock.
    pub fn new(rules: RuleSet) -> Self {
        Self::with_clock(rules, Arc::new(SystemClock))
    }

    /// Create a new rate limiter with an explicit clock.
    pub fn with_clock(rules: RuleSet, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: RateLimitStore::new(),
            rules: RwLock::new(Arc::new(rules)),
            clock,
        }
    }

    /// Check and record a request using the limiter's clock.
    pub fn check(&self, client_id: &str, path: &str) -> Option<Decision> {
        self.check_and_record(client_id, path, self.clock.now_millis())
    }

    /// Check the rate limit for `path` on behalf of `client_id` at `now_ms`.
    ///
    /// Returns `None` when the path is outside the protected namespace.
    /// Otherwise the request is counted against the matched rule's window,
    /// whether or not it is admitted.
    pub fn check_and_record(&self, client_id: &str, path: &str, now_ms: u64) -> Option<Decision> {
        let rules = self.rules();
        let matched = rules.match_path(path)?;
        let key = RateLimitKey::new(client_id, matched.prefix);
        let limit = matched.limit.limit;

        let record = self.store.hit(key.clone(), now_ms, matched.limit.window());

        trace!(
            key = %key,
            count = record.count,
            limit,
            reset_at_ms = record.reset_at_ms,
            "Checked rate limit"
        );

        if record.count == 1 {
            debug!(key = %key, limit, window_ms = matched.limit.window_ms, "Opened rate limit window");
        }

        if record.count > limit {
            let retry_after_secs = record.retry_after_secs(now_ms);
            debug!(
                key = %key,
                count = record.count,
                limit,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Some(Decision::Reject {
                limit,
                reset_at_ms: record.reset_at_ms,
                retry_after_secs,
            });
        }

        Some(Decision::Admit {
            limit,
            remaining: limit - record.count,
            reset_at_ms: record.reset_at_ms,
        })
    }

    /// Remove expired records as of the limiter's clock.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now_millis())
    }

    /// Remove records whose window ended before `now_ms`.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let removed = self.store.sweep(now_ms);
        if removed > 0 {
            debug!(removed, remaining = self.store.len(), "Removed expired rate limit records");
        }
        removed
    }

    /// Get the active rule set.
    pub fn rules(&self) -> Arc<RuleSet> {
        self.rules.read().clone()
    }

    /// Replace the rule set.
    ///
    /// Existing records keep their windows and are judged against the new
    /// limits from their next request on.
    pub fn set_rules(&self, rules: RuleSet) {
        info!(
            namespace = %rules.namespace(),
            rules = rules.rules().len(),
            "Applying rate limit rules"
        );
        *self.rules.write() = Arc::new(rules);
    }

    /// Get the record store.
    pub fn store(&self) -> &RateLimitStore {
        &self.store
    }

    /// Get the number of tracked records.
    pub fn record_count(&self) -> usize {
        self.store.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rules", &self.rules())
            .field("records", &self.store.len())
            .finish()
    }
}
