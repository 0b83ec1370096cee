//! In-memory record store.

use dashmap::DashMap;
use std::time::Duration;
use tracing::trace;

use super::counter::RateLimitRecord;
use super::key::RateLimitKey;

/// Concurrent map from rate limit key to its current window record.
///
/// Each [`RateLimitStore::hit`] performs its read-modify-write while holding
/// the entry's shard lock, so concurrent requests for the same key are
/// serialized and cannot both slip under the limit.
#[derive(Debug, Default)]
pub struct RateLimitStore {
    records: DashMap<RateLimitKey, RateLimitRecord>,
}

impl RateLimitStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request for `key` and return the updated record.
    pub fn hit(&self, key: RateLimitKey, now_ms: u64, window: Duration) -> RateLimitRecord {
        let mut entry = self
            .records
            .entry(key)
            .or_insert_with(|| RateLimitRecord {
                count: 0,
                reset_at_ms: now_ms,
            });

        // A fresh entry is expired at `now_ms` and opens a new window here.
        entry.hit(now_ms, window);
        *entry
    }

    /// Get a copy of the record for `key`, expired or not.
    pub fn get(&self, key: &RateLimitKey) -> Option<RateLimitRecord> {
        self.records.get(key).map(|record| *record)
    }

    /// Remove every record whose window ended before `now_ms`.
    ///
    /// Returns the number of records removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = record.reset_at_ms >= now_ms;
            if !keep {
                removed += 1;
            }
            keep
        });

        trace!(removed, remaining = self.records.len(), "Swept rate limit records");
        removed
    }

    /// Get the number of tracked records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_first_hit_opens_window() {
        let store = RateLimitStore::new();
        let key = RateLimitKey::new("1.2.3.4", "/api/");

        let record = store.hit(key.clone(), 5_000, MINUTE);
        assert_eq!(record.count, 1);
        assert_eq!(record.reset_at_ms, 65_000);
        assert_eq!(store.get(&key), Some(record));
    }

    #[test]
    fn test_keys_are_independent() {
        let store = RateLimitStore::new();
        let a = RateLimitKey::new("a", "/api/");
        let b = RateLimitKey::new("b", "/api/");

        store.hit(a.clone(), 0, MINUTE);
        store.hit(a.clone(), 1, MINUTE);
        store.hit(b.clone(), 2, MINUTE);

        assert_eq!(store.get(&a).unwrap().count, 2);
        assert_eq!(store.get(&b).unwrap().count, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = RateLimitStore::new();
        let old = RateLimitKey::new("old", "/api/");
        let edge = RateLimitKey::new("edge", "/api/");
        let fresh = RateLimitKey::new("fresh", "/api/");

        store.hit(old.clone(), 0, MINUTE); // resets at 60_000
        store.hit(edge.clone(), 40_000, MINUTE); // resets at 100_000
        store.hit(fresh.clone(), 50_000, MINUTE); // resets at 110_000
        store.hit(fresh.clone(), 51_000, MINUTE);

        let removed = store.sweep(100_000);
        assert_eq!(removed, 1);
        assert!(store.get(&old).is_none());

        // Untouched records keep count and reset time.
        assert_eq!(
            store.get(&edge),
            Some(RateLimitRecord { count: 1, reset_at_ms: 100_000 })
        );
        assert_eq!(
            store.get(&fresh),
            Some(RateLimitRecord { count: 2, reset_at_ms: 110_000 })
        );
    }

    #[test]
    fn test_concurrent_hits_are_all_counted() {
        let store = std::sync::Arc::new(RateLimitStore::new());
        let key = RateLimitKey::new("burst", "/api/contato");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        store.hit(key.clone(), 1_000, MINUTE);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(&key).unwrap().count, 2_000);
    }

    #[test]
    fn test_sweep_counts_each_removed_record() {
        let store = RateLimitStore::new();
        for client in ["a", "b", "c"] {
            store.hit(RateLimitKey::new(client, "/api/"), 0, MINUTE);
        }
        store.hit(RateLimitKey::new("d", "/api/"), 90_000, MINUTE);
        assert!(!store.is_empty());

        assert_eq!(store.sweep(100_000), 3);
        assert_eq!(store.len(), 1);
        assert_eq!(store.sweep(100_000), 0);
    }
}
