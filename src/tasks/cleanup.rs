//! Cleanup Task
//!
//! Background task that periodically sweeps a cache: expired entries are
//! removed, then LRU eviction runs if usage is still above the threshold.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::WeakTieredCache;

/// Spawns a background task that calls `cleanup` on the cache every
/// `interval`.
///
/// The task holds only a weak handle: it stops by itself once every
/// [`TieredCache`](crate::cache::TieredCache) handle is gone. The returned
/// JoinHandle is kept by the cache and aborted by `destroy`.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(cache.downgrade(), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: WeakTieredCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting cache cleanup task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping cleanup task");
                break;
            };

            let removed = cache.cleanup().await;
            debug!("Cleanup tick removed {} entries", removed);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TieredCache;
    use crate::config::CacheConfig;

    fn config(interval: Duration) -> CacheConfig {
        CacheConfig::default()
            .with_max_entries(100)
            .with_cleanup_interval(interval)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache: TieredCache<String> = TieredCache::new(config(Duration::from_secs(1))).unwrap();
        cache
            .set_with_ttl("expire_soon", "value".to_string(), Duration::from_millis(500))
            .await;

        // Let the entry expire and one sweep run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.len().await, 0, "Expired entry should have been cleaned up");
        assert_eq!(cache.get_stats().await.cleanup_runs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache: TieredCache<String> = TieredCache::new(config(Duration::from_secs(1))).unwrap();
        cache
            .set_with_ttl("long_lived", "value".to_string(), Duration::from_secs(3600))
            .await;

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(cache.get("long_lived").await, Some("value".to_string()));
        assert_eq!(cache.get_stats().await.cleanup_runs, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_after_destroy() {
        let cache: TieredCache<String> = TieredCache::new(config(Duration::from_secs(1))).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        cache.destroy().await;

        // Counters were reset by destroy and must stay untouched
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cache.get_stats().await.cleanup_runs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_stops_when_cache_dropped() {
        let cache: TieredCache<String> = TieredCache::new(config(Duration::from_secs(1))).unwrap();
        let handle = spawn_cleanup_task(cache.downgrade(), Duration::from_secs(1));

        drop(cache);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(handle.is_finished(), "Task should stop once the cache is gone");
    }
}
