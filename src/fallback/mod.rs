//! Fallback Store Module
//!
//! The slower, durable tier consulted on a memory miss. The cache only sees
//! it through the [`FallbackStore`] capability, so any key/value backend can
//! sit behind it (a database table, Redis, an HTTP service).

mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FallbackError;

pub use memory::MemoryFallback;

/// Result type returned by fallback stores.
pub type FallbackResult<T> = Result<T, FallbackError>;

// == Fallback Store ==
/// Capability interface of the fallback tier.
///
/// Implementations are shared, never owned by the cache, and may be used by
/// other consumers at the same time. Timeouts are the implementation's
/// concern; a timed-out call should return [`FallbackError::Timeout`].
#[async_trait]
pub trait FallbackStore<V>: Send + Sync {
    async fn get(&self, key: &str) -> FallbackResult<Option<V>>;

    async fn set(&self, key: &str, value: V, ttl: Duration) -> FallbackResult<()>;

    /// Deletion is optional; stores without it keep the default.
    async fn delete(&self, key: &str) -> FallbackResult<()> {
        let _ = key;
        Err(FallbackError::Unsupported("delete"))
    }

    /// Name used in log events.
    fn name(&self) -> &str {
        "fallback"
    }
}
