//! Tiered Cache - a memory-bounded cache for expensive results
//!
//! Keeps values in memory under a byte and entry budget, expires them by
//! TTL, evicts least recently used entries under pressure, and falls back to
//! a slower durable store on a miss. No cache operation ever fails.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStats, TieredCache, TieredCacheBuilder};
pub use config::{CacheConfig, Config};
pub use error::{ConfigError, FallbackError};
pub use fallback::{FallbackStore, MemoryFallback};
