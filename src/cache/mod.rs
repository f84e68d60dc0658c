//! Cache Module
//!
//! Provides a memory-bounded cache with TTL expiration, LRU eviction and an
//! optional fallback tier.

mod entry;
mod lru;
mod size;
mod stats;
mod store;
mod tiered;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::{EvictionGoal, LruPolicy, Usage, HYSTERESIS_PERCENT};
pub use size::{JsonSizeEstimator, SizeEstimator};
pub use stats::{CacheStats, StatsCollector};
pub use store::{CleanupReport, InsertOutcome, MemoryStore};
pub use tiered::{TieredCache, TieredCacheBuilder, WeakTieredCache};
