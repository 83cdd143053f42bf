//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a background task that periodically purges expired cache entries.
///
/// Lookups already treat expired entries as absent; this task reclaims the
/// memory of entries nobody asks for again. Abort the returned handle to
/// stop it.
///
/// # Example
/// ```ignore
/// let cache = cachepool::cache::shared(CacheStore::<String>::new(1000, 300));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: SharedCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        info!(?interval, "Starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.lock().cleanup_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::{shared, CacheStore};
    use crate::clock::ManualClock;

    fn manual_cache() -> (SharedCache<String>, ManualClock) {
        let clock = ManualClock::new(0);
        let cache = shared(CacheStore::with_clock(100, 300, Arc::new(clock.clone())));
        (cache, clock)
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let (cache, clock) = manual_cache();
        cache.lock().set("expire_soon", "value".to_string(), Some(1));
        clock.advance_secs(2);

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.lock().len(), 0, "Expired entry should have been purged");
        assert_eq!(cache.lock().stats().expirations, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let (cache, clock) = manual_cache();
        cache.lock().set("long_lived", "value".to_string(), Some(3600));
        clock.advance_secs(10);

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.lock().get("long_lived"), Some("value".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let (cache, _clock) = manual_cache();

        let handle = spawn_cleanup_task(cache, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
