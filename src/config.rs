//! Configuration Module
//!
//! Cache limits and timings, plus the server settings used by the binary.
//! Both can be loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

// == Defaults ==
/// Default memory budget: 50 MiB
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 50 * 1024 * 1024;
/// Default entry budget
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
/// Default time-to-live: 30 minutes
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
/// Default sweep interval: 5 minutes
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default fraction of a limit at which the sweep starts evicting
pub const DEFAULT_EVICTION_THRESHOLD: f64 = 0.8;

// == Cache Config ==
/// Limits and timings for a [`TieredCache`](crate::cache::TieredCache).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Upper bound on the summed estimated size of all entries
    pub max_memory_bytes: u64,
    /// Upper bound on the number of entries
    pub max_entries: usize,
    /// TTL applied when `set` is called without one, and to values
    /// re-populated from the fallback store
    pub default_ttl: Duration,
    /// Period of the background sweep
    pub cleanup_interval: Duration,
    /// Fraction (0, 1] of either limit above which the sweep evicts
    pub eviction_threshold: f64,
}

impl CacheConfig {
    /// Loads the cache configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_MEMORY_BYTES` - Memory budget in bytes (default: 50 MiB)
    /// - `CACHE_MAX_ENTRIES` - Entry budget (default: 1000)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 1800)
    /// - `CACHE_CLEANUP_INTERVAL_SECS` - Sweep interval in seconds (default: 300)
    /// - `CACHE_EVICTION_THRESHOLD` - Proactive eviction threshold (default: 0.8)
    ///
    /// Missing or unparsable values fall back to their default.
    pub fn from_env() -> Self {
        Self {
            max_memory_bytes: env_or("CACHE_MAX_MEMORY_BYTES", DEFAULT_MAX_MEMORY_BYTES),
            max_entries: env_or("CACHE_MAX_ENTRIES", DEFAULT_MAX_ENTRIES),
            default_ttl: Duration::from_secs(env_or(
                "CACHE_DEFAULT_TTL_SECS",
                DEFAULT_TTL.as_secs(),
            )),
            cleanup_interval: Duration::from_secs(env_or(
                "CACHE_CLEANUP_INTERVAL_SECS",
                DEFAULT_CLEANUP_INTERVAL.as_secs(),
            )),
            eviction_threshold: env_or("CACHE_EVICTION_THRESHOLD", DEFAULT_EVICTION_THRESHOLD),
        }
    }

    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_eviction_threshold(mut self, threshold: f64) -> Self {
        self.eviction_threshold = threshold;
        self
    }

    // == Validate ==
    /// Checks the invariants the cache relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.eviction_threshold > 0.0 && self.eviction_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.eviction_threshold));
        }
        if self.max_memory_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_memory_bytes"));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::ZeroLimit("max_entries"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
        }
    }
}

// == Server Config ==
/// Settings for the HTTP binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings of the embedded cache
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Loads the cache settings plus `SERVER_PORT` (default: 3000).
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
