//! LRU Tracker Module
//!
//! Records the last access time of every key for least-recently-used eviction.

use std::collections::{BTreeMap, HashMap};

/// Access stamp: last access time in milliseconds plus a tie-break sequence.
type AccessStamp = (u64, u64);

// == LRU Tracker ==
/// Tracks last-access stamps for LRU eviction.
///
/// Each touch records `(now_ms, seq)` where `seq` grows on every touch, so
/// keys touched within the same millisecond still evict in access order.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Last access stamp per key
    stamps: HashMap<String, AccessStamp>,
    /// Keys ordered by access stamp, oldest first
    order: BTreeMap<AccessStamp, String>,
    /// Next tie-break sequence number
    seq: u64,
}

impl LruTracker {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Records an access to `key` at `now_ms`, tracking it if new.
    pub fn touch(&mut self, key: &str, now_ms: u64) {
        let stamp = (now_ms, self.seq);
        self.seq += 1;

        if let Some(previous) = self.stamps.insert(key.to_string(), stamp) {
            self.order.remove(&previous);
        }
        self.order.insert(stamp, key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key. No-op if the key is unknown.
    pub fn remove(&mut self, key: &str) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the key with the smallest access stamp.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    #[allow(dead_code)]
    pub fn peek_oldest(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    /// Last access time of `key` in milliseconds.
    #[allow(dead_code)]
    pub fn last_access(&self, key: &str) -> Option<u64> {
        self.stamps.get(key).map(|(ms, _)| *ms)
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }
}
