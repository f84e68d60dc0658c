//! Cache Statistics Module
//!
//! Running counters for hits, misses, evictions and sweeps, plus the derived
//! snapshot reported by `get_stats`.

use serde::Serialize;

use crate::cache::lru::Usage;

// == Stats Collector ==
/// Increment-only counters. Reset only by tearing the cache down.
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    hits: u64,
    misses: u64,
    evictions: u64,
    cleanup_runs: u64,
}

impl StatsCollector {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    pub fn record_cleanup_run(&mut self) {
        self.cleanup_runs += 1;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn cleanup_runs(&self) -> u64 {
        self.cleanup_runs
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // == Snapshot ==
    /// Combines the counters with the live usage of the store.
    pub fn snapshot(&self, usage: Usage, max_bytes: u64, max_entries: usize) -> CacheStats {
        CacheStats {
            memory_entries: usage.entries,
            memory_size_bytes: usage.bytes,
            hit_rate: ratio(self.hits as f64, (self.hits + self.misses) as f64),
            total_hits: self.hits,
            total_misses: self.misses,
            evictions: self.evictions,
            cleanup_runs: self.cleanup_runs,
            memory_usage_percent: ratio(usage.bytes as f64, max_bytes as f64) * 100.0,
            entries_usage_percent: ratio(usage.entries as f64, max_entries as f64) * 100.0,
            avg_entry_size_bytes: ratio(usage.bytes as f64, usage.entries as f64),
        }
    }
}

/// `num / den`, or 0.0 when the denominator is zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

// == Cache Stats ==
/// Point-in-time view of the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Live entries in the memory tier
    pub memory_entries: usize,
    /// Summed estimated size of the live entries
    pub memory_size_bytes: u64,
    /// hits / (hits + misses), 0.0 before the first lookup
    pub hit_rate: f64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub evictions: u64,
    pub cleanup_runs: u64,
    pub memory_usage_percent: f64,
    pub entries_usage_percent: f64,
    pub avg_entry_size_bytes: f64,
}
