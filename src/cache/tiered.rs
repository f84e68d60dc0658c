//! Tiered Cache Module
//!
//! The public facade: a memory tier guarded by a single mutex, an optional
//! fallback tier behind [`FallbackStore`], and a background sweep. No
//! operation returns an error; fallback failures degrade to misses on reads
//! and are logged and dropped on writes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, InsertOutcome, JsonSizeEstimator, MemoryStore, SizeEstimator};
use crate::config::CacheConfig;
use crate::error::{ConfigError, FallbackError};
use crate::fallback::FallbackStore;
use crate::tasks::spawn_cleanup_task;

struct Inner<V> {
    store: Mutex<MemoryStore<V>>,
    fallback: Option<Arc<dyn FallbackStore<V>>>,
    estimator: Arc<dyn SizeEstimator<V>>,
    config: CacheConfig,
    scheduler: StdMutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
    /// Fallback reads in flight; only incremented under the store lock
    fallback_reads: AtomicUsize,
}

/// Registers a fallback read for as long as it lives, so a `get` dropped
/// mid-read releases its slot too.
struct FallbackRead<'a>(&'a AtomicUsize);

impl<'a> FallbackRead<'a> {
    fn begin(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for FallbackRead<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        let scheduler = self
            .scheduler
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = scheduler.take() {
            handle.abort();
        }
    }
}

// == Tiered Cache ==
/// Memory-bounded cache with TTL expiry, LRU eviction and a fallback tier.
///
/// Cloning yields another handle to the same cache. The background sweep
/// only holds a weak reference, so dropping every handle also stops it;
/// [`destroy`](Self::destroy) stops it explicitly.
pub struct TieredCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for TieredCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle held by the cleanup task.
pub struct WeakTieredCache<V> {
    inner: Weak<Inner<V>>,
}

impl<V> WeakTieredCache<V> {
    pub fn upgrade(&self) -> Option<TieredCache<V>> {
        self.inner.upgrade().map(|inner| TieredCache { inner })
    }
}

// == Builder ==
pub struct TieredCacheBuilder<V> {
    config: CacheConfig,
    fallback: Option<Arc<dyn FallbackStore<V>>>,
    estimator: Arc<dyn SizeEstimator<V>>,
}

impl<V> TieredCacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Starts a builder with an explicit size estimator, for value types
    /// that are not `Serialize`.
    pub fn with_estimator(config: CacheConfig, estimator: impl SizeEstimator<V> + 'static) -> Self {
        Self {
            config,
            fallback: None,
            estimator: Arc::new(estimator),
        }
    }

    pub fn fallback(mut self, fallback: Arc<dyn FallbackStore<V>>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn size_estimator(mut self, estimator: impl SizeEstimator<V> + 'static) -> Self {
        self.estimator = Arc::new(estimator);
        self
    }

    /// Validates the configuration, creates the cache and starts its sweep.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<TieredCache<V>, ConfigError> {
        self.config.validate()?;

        let cache = TieredCache {
            inner: Arc::new(Inner {
                store: Mutex::new(MemoryStore::new(&self.config)),
                fallback: self.fallback,
                estimator: self.estimator,
                config: self.config,
                scheduler: StdMutex::new(None),
                destroyed: AtomicBool::new(false),
                fallback_reads: AtomicUsize::new(0),
            }),
        };

        let handle = spawn_cleanup_task(cache.downgrade(), cache.inner.config.cleanup_interval);
        *cache
            .inner
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!(
            max_memory_bytes = cache.inner.config.max_memory_bytes,
            max_entries = cache.inner.config.max_entries,
            default_ttl_secs = cache.inner.config.default_ttl.as_secs(),
            eviction_threshold = cache.inner.config.eviction_threshold,
            fallback = cache.inner.fallback.as_ref().map(|f| f.name()).unwrap_or("none"),
            "Tiered cache initialised"
        );

        Ok(cache)
    }
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + Serialize + 'static,
{
    /// Builder using [`JsonSizeEstimator`] for memory accounting.
    pub fn builder(config: CacheConfig) -> TieredCacheBuilder<V> {
        TieredCacheBuilder::with_estimator(config, JsonSizeEstimator)
    }

    /// Memory-only cache with the JSON size estimator.
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn downgrade(&self) -> WeakTieredCache<V> {
        WeakTieredCache {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    // == Get ==
    /// Looks `key` up in memory, then in the fallback store.
    ///
    /// A fallback hit is copied back into memory with the default TTL. A
    /// fallback error is logged and counts as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        if self.is_destroyed() {
            return None;
        }

        let (since, _read) = {
            let mut store = self.inner.store.lock().await;
            if let Some(value) = store.get(key, Instant::now()) {
                store.stats_mut().record_hit();
                return Some(value);
            }
            if self.inner.fallback.is_none() {
                store.stats_mut().record_miss();
                return None;
            }
            if self.inner.fallback_reads.load(Ordering::Acquire) == 0 {
                store.forget_writes();
            }
            (
                store.write_seq(),
                FallbackRead::begin(&self.inner.fallback_reads),
            )
        };

        let fetched = match &self.inner.fallback {
            Some(fallback) => match fallback.get(key).await {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        key,
                        fallback = fallback.name(),
                        error = %err,
                        "Fallback read failed, treating as miss"
                    );
                    None
                }
            },
            None => None,
        };

        let Some(value) = fetched else {
            let mut store = self.inner.store.lock().await;
            if !self.is_destroyed() {
                store.stats_mut().record_miss();
            }
            return None;
        };

        let size_bytes = self.inner.estimator.estimate_size(&value);
        let mut store = self.inner.store.lock().await;
        if self.is_destroyed() {
            return Some(value);
        }
        store.stats_mut().record_hit();

        // A set or invalidate of this key during the fallback read is newer
        // than what the fallback returned.
        if !store.written_since(key, since) {
            store.insert(
                key.to_string(),
                value.clone(),
                size_bytes,
                self.inner.config.default_ttl,
                Instant::now(),
            );
            self.note_write(&mut store, key);
            debug!(key, size_bytes, "Re-populated memory from fallback");
        }

        Some(value)
    }

    // == Set ==
    /// Stores `value` with the default TTL.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.inner.config.default_ttl)
            .await
    }

    /// Stores `value` in memory now and in the fallback store in the
    /// background. Last write wins.
    ///
    /// A value whose estimated size exceeds `max_memory_bytes` is not kept
    /// in memory (any older value for the key is dropped) but is still
    /// handed to the fallback store.
    pub async fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if self.is_destroyed() {
            return;
        }

        let key = key.into();
        let size_bytes = self.inner.estimator.estimate_size(&value);

        let outcome = {
            let mut store = self.inner.store.lock().await;
            // destroy() may have run while the size was estimated
            if self.is_destroyed() {
                return;
            }
            let outcome = store.insert(key.clone(), value.clone(), size_bytes, ttl, Instant::now());
            self.note_write(&mut store, &key);
            outcome
        };
        if let InsertOutcome::Stored { evicted } = outcome {
            if evicted > 0 {
                debug!(key = %key, evicted, "Evicted entries to make room");
            }
        }

        if let Some(fallback) = &self.inner.fallback {
            let fallback = Arc::clone(fallback);
            tokio::spawn(async move {
                if let Err(err) = fallback.set(&key, value, ttl).await {
                    warn!(
                        key = %key,
                        fallback = fallback.name(),
                        error = %err,
                        "Fallback write failed"
                    );
                }
            });
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value or produces, stores and returns a new one.
    ///
    /// A producer error is returned as is and nothing is stored.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = compute().await?;
        let ttl = ttl.unwrap_or(self.inner.config.default_ttl);
        self.set_with_ttl(key, value.clone(), ttl).await;
        Ok(value)
    }

    // == Invalidate ==
    /// Removes `key` from memory and asks the fallback store to delete it.
    /// Deletion in the fallback tier is best effort.
    pub async fn invalidate(&self, key: &str) {
        if self.is_destroyed() {
            return;
        }

        {
            let mut store = self.inner.store.lock().await;
            if self.is_destroyed() {
                return;
            }
            store.remove(key);
            self.note_write(&mut store, key);
        }

        if let Some(fallback) = &self.inner.fallback {
            match fallback.delete(key).await {
                Ok(()) => {}
                Err(FallbackError::Unsupported(op)) => {
                    debug!(key, fallback = fallback.name(), op, "Fallback delete skipped");
                }
                Err(err) => {
                    warn!(
                        key,
                        fallback = fallback.name(),
                        error = %err,
                        "Fallback delete failed"
                    );
                }
            }
        }
    }

    // == Cleanup ==
    /// Runs one sweep and returns the number of entries removed (expired
    /// plus evicted).
    pub async fn cleanup(&self) -> usize {
        if self.is_destroyed() {
            return 0;
        }

        let report = {
            let mut store = self.inner.store.lock().await;
            if self.is_destroyed() {
                return 0;
            }
            store.cleanup(Instant::now())
        };
        if report.removed() > 0 {
            info!(
                expired = report.expired,
                evicted = report.evicted,
                "Cache cleanup removed entries"
            );
        } else {
            debug!("Cache cleanup: nothing to remove");
        }
        report.removed()
    }

    /// Logs a write to `key` for any fallback read racing it. With no read
    /// in flight the log is dropped instead.
    fn note_write(&self, store: &mut MemoryStore<V>, key: &str) {
        if self.inner.fallback_reads.load(Ordering::Acquire) > 0 {
            store.record_write(key);
        } else {
            store.forget_writes();
        }
    }

    // == Stats ==
    pub async fn get_stats(&self) -> CacheStats {
        self.inner.store.lock().await.stats()
    }

    /// True if `key` is live in memory. Not counted as an access.
    pub async fn contains_key(&self, key: &str) -> bool {
        self.inner.store.lock().await.contains(key, Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.inner.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.store.lock().await.is_empty()
    }

    // == Destroy ==
    /// Stops the background sweep and clears all entries and counters.
    ///
    /// Once this returns no sweep runs again, and every handle sees an empty,
    /// inert cache. Calling it again is a no-op.
    pub async fn destroy(&self) {
        let first = !self.inner.destroyed.swap(true, Ordering::AcqRel);

        let handle = self
            .inner
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            // Wait for the task to actually stop
            let _ = handle.await;
        }

        self.inner.store.lock().await.clear();

        if first {
            info!("Tiered cache destroyed");
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{FallbackResult, MemoryFallback};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Reads its value up front, then takes `delay` to answer.
    struct SlowFallback {
        inner: MemoryFallback<u32>,
        delay: Duration,
    }

    #[async_trait]
    impl FallbackStore<u32> for SlowFallback {
        async fn get(&self, key: &str) -> FallbackResult<Option<u32>> {
            let value = self.inner.get(key).await;
            tokio::time::sleep(self.delay).await;
            value
        }

        async fn set(&self, key: &str, value: u32, ttl: Duration) -> FallbackResult<()> {
            self.inner.set(key, value, ttl).await
        }
    }

    async fn slow_cache(remote: u32) -> TieredCache<u32> {
        let inner = MemoryFallback::new();
        inner
            .set("remote", remote, Duration::from_secs(3600))
            .await
            .unwrap();
        let fallback = Arc::new(SlowFallback {
            inner,
            delay: Duration::from_millis(100),
        });
        TieredCache::builder(config()).fallback(fallback).build().unwrap()
    }

    fn config() -> CacheConfig {
        CacheConfig::default()
            .with_max_entries(100)
            .with_max_memory_bytes(10_000)
            .with_default_ttl(Duration::from_secs(60))
            .with_cleanup_interval(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache: TieredCache<String> = TieredCache::new(config()).unwrap();

        cache.set("key1", "value1".to_string()).await;

        assert_eq!(cache.get("key1").await, Some("value1".to_string()));
        assert_eq!(cache.get("missing").await, None);

        let stats = cache.get_stats().await;
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 1);
        assert_eq!(stats.memory_entries, 1);
        // "\"value1\""
        assert_eq!(stats.memory_size_bytes, 8);
    }

    #[tokio::test]
    async fn test_null_round_trips_as_hit() {
        let cache: TieredCache<Value> = TieredCache::new(config()).unwrap();

        cache.set("nothing", Value::Null).await;
        cache.set("zero", json!(0)).await;
        cache.set("empty", json!("")).await;
        cache.set("no", json!(false)).await;

        assert_eq!(cache.get("nothing").await, Some(Value::Null));
        assert_eq!(cache.get("zero").await, Some(json!(0)));
        assert_eq!(cache.get("empty").await, Some(json!("")));
        assert_eq!(cache.get("no").await, Some(json!(false)));
        assert_eq!(cache.get_stats().await.total_misses, 0);
    }

    #[tokio::test]
    async fn test_option_none_is_a_value() {
        let cache: TieredCache<Option<u32>> = TieredCache::new(config()).unwrap();

        cache.set("k", None).await;
        assert_eq!(cache.get("k").await, Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_then_cleanup() {
        let cache: TieredCache<u32> = TieredCache::new(config()).unwrap();
        cache.set_with_ttl("short", 1, Duration::from_secs(1)).await;
        cache.set_with_ttl("long", 2, Duration::from_secs(100)).await;

        tokio::time::advance(Duration::from_millis(1001)).await;

        assert!(!cache.contains_key("short").await);
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.cleanup().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get_stats().await.cleanup_runs, 1);
    }

    #[tokio::test]
    async fn test_invalidate_is_immediate() {
        let cache: TieredCache<u32> = TieredCache::new(config()).unwrap();
        cache.set("k", 1).await;

        cache.invalidate("k").await;

        assert_eq!(cache.get("k").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_fallback_hit_repopulates_memory() {
        let fallback: Arc<MemoryFallback<u32>> = Arc::new(MemoryFallback::new());
        fallback
            .set("remote", 7, Duration::from_secs(60))
            .await
            .unwrap();
        let cache: TieredCache<u32> = TieredCache::builder(config())
            .fallback(fallback.clone())
            .build()
            .unwrap();

        assert_eq!(cache.get("remote").await, Some(7));
        assert!(cache.contains_key("remote").await);

        let stats = cache.get_stats().await;
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 0);
    }

    #[tokio::test]
    async fn test_get_or_compute() {
        let cache: TieredCache<u32> = TieredCache::new(config()).unwrap();

        let value = cache
            .get_or_compute("k", None, || async { Ok::<u32, String>(5) })
            .await;
        assert_eq!(value, Ok(5));

        // Cached now: the producer must not run
        let value = cache
            .get_or_compute("k", None, || async {
                Err::<u32, String>("recomputed".to_string())
            })
            .await;
        assert_eq!(value, Ok(5));

        let failed = cache
            .get_or_compute("bad", None, || async {
                Err::<u32, String>("boom".to_string())
            })
            .await;
        assert_eq!(failed, Err("boom".to_string()));
        assert!(!cache.contains_key("bad").await);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result: Result<TieredCache<u32>, _> =
            TieredCache::new(config().with_eviction_threshold(1.5));
        assert!(matches!(result, Err(ConfigError::InvalidThreshold(_))));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent_and_clears() {
        let cache: TieredCache<u32> = TieredCache::new(config()).unwrap();
        cache.set("k", 1).await;
        cache.get("k").await;

        cache.destroy().await;
        cache.destroy().await;

        assert!(cache.is_destroyed());
        assert!(cache.is_empty().await);
        assert_eq!(cache.get_stats().await.total_hits, 0);

        cache.set("k", 2).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.cleanup().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_write_does_not_block_repopulation() {
        let cache = slow_cache(7).await;

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("remote").await })
        };
        // Reader is now waiting on the fallback
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set("unrelated", 1).await;

        assert_eq!(reader.await.unwrap(), Some(7));
        assert!(cache.contains_key("remote").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_during_fallback_read_wins() {
        let cache = slow_cache(7).await;

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("remote").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set("remote", 9).await;

        assert_eq!(reader.await.unwrap(), Some(7));
        assert_eq!(cache.get("remote").await, Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_fallback_read_is_not_undone() {
        let cache = slow_cache(7).await;

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("remote").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.invalidate("remote").await;

        reader.await.unwrap();
        assert!(!cache.contains_key("remote").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_set_racing_destroy_leaves_cache_empty() {
        let cache: TieredCache<u32> = TieredCacheBuilder::with_estimator(config(), |_: &u32| {
            std::thread::sleep(Duration::from_millis(200));
            4
        })
        .build()
        .unwrap();

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.set("late", 1).await })
        };
        // Writer is past its first check and busy sizing the value
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.destroy().await;
        writer.await.unwrap();

        assert!(cache.is_empty().await);
        assert_eq!(cache.cleanup().await, 0);
        assert_eq!(cache.get_stats().await.cleanup_runs, 0);
    }
}
