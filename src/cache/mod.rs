//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction.

mod entry;
mod lru;
mod stats;
mod store;


use std::sync::Arc;

use parking_lot::Mutex;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::CacheStore;

/// A cache store shared between callers and tasks.
///
/// Every operation takes the lock for its whole read-evict-write sequence and
/// never awaits while holding it.
pub type SharedCache<V> = Arc<Mutex<CacheStore<V>>>;

/// Wraps a store for sharing.
pub fn shared<V>(store: CacheStore<V>) -> SharedCache<V> {
    Arc::new(Mutex::new(store))
}
