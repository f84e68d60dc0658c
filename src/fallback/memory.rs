//! In-process fallback store.
//!
//! A TTL-honouring map that can be shared between several caches in the same
//! process. Entries are not bounded in number; expired ones are dropped when
//! read or overwritten, or by [`MemoryFallback::purge_expired`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{FallbackResult, FallbackStore};

#[derive(Debug)]
pub struct MemoryFallback<V> {
    entries: Mutex<HashMap<String, (V, Instant)>>,
}

impl<V> Default for MemoryFallback<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> MemoryFallback<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| now <= *expires_at);
        before - entries.len()
    }
}

#[async_trait]
impl<V> FallbackStore<V> for MemoryFallback<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> FallbackResult<Option<V>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some((value, expires_at)) if now <= *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> FallbackResult<()> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30));

        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> FallbackResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
