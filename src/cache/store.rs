//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::clock::{system_clock, Clock};
use crate::config::CacheConfig;

// == Cache Store ==
/// Bounded key-value store with LRU eviction and TTL expiry.
///
/// Lookups never fail: an absent or expired key is reported as `None`.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Default TTL in seconds for entries without explicit TTL
    default_ttl: u64,
    /// Time source for expiry and access stamps
    clock: Arc<dyn Clock>,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and default TTL.
    ///
    /// # Arguments
    /// * `max_size` - Maximum number of entries the cache can hold (at least 1)
    /// * `default_ttl` - Default TTL in seconds for entries without explicit TTL
    pub fn new(max_size: usize, default_ttl: u64) -> Self {
        Self::with_clock(max_size, default_ttl, system_clock())
    }

    /// Creates a CacheStore driven by the given clock.
    pub fn with_clock(max_size: usize, default_ttl: u64, clock: Arc<dyn Clock>) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(max_size),
            max_size,
            default_ttl,
            clock,
        }
    }

    /// Creates a CacheStore from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, config.default_ttl)
    }

    // == Set ==
    /// Stores a value under `key`.
    ///
    /// An existing key is overwritten and its TTL reset. Inserting a new key
    /// into a full store first evicts the least recently accessed entry.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL in seconds (uses default_ttl if None)
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<u64>) {
        let key = key.into();
        let now = self.clock.now_ms();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            if let Some(evicted) = self.lru.evict_oldest() {
                if let Some(entry) = self.entries.remove(&evicted) {
                    debug!(
                        key = %evicted,
                        age_ms = entry.age_ms(now),
                        ttl_remaining_ms = entry.ttl_remaining_ms(now),
                        "Evicted least recently used entry"
                    );
                }
                self.stats.record_eviction();
            }
        }

        let entry = CacheEntry::new(value, now, ttl.unwrap_or(self.default_ttl));
        self.entries.insert(key.clone(), entry);
        self.lru.touch(&key, now);
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` if the key is absent or expired. Expired entries are
    /// removed on the way out. A hit refreshes the key's access stamp.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            debug!(key, "Cache entry expired");
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key, now);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Contains ==
    /// Checks for a live entry without touching its access stamp or counters.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru.remove(key);
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Removes every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
            self.lru.remove(&key);
        }

        self.stats.record_expirations(count);
        count
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }
}
