//! Memory Store Module
//!
//! The synchronous memory tier: a HashMap of entries with exact size
//! accounting, lazy and active expiry, and LRU eviction under pressure.
//! Callers serialize access to it (the facade keeps it behind a mutex).

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::lru::{EvictionGoal, LruPolicy, Usage};
use crate::cache::{CacheEntry, CacheStats, StatsCollector};
use crate::config::CacheConfig;

// == Insert Outcome ==
/// Result of placing a value in the memory tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored, after evicting `evicted` other entries to make room
    Stored { evicted: usize },
    /// The value alone is larger than the memory budget and was not stored
    Rejected,
}

// == Cleanup Report ==
/// What a single sweep removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    pub expired: usize,
    pub evicted: usize,
}

impl CleanupReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

// == Memory Store ==
#[derive(Debug)]
pub struct MemoryStore<V> {
    entries: HashMap<String, CacheEntry<V>>,
    stats: StatsCollector,
    max_memory_bytes: u64,
    max_entries: usize,
    eviction_threshold: f64,
    /// Bumped on every insert and successful read
    next_seq: u64,
    /// Bumped on every recorded caller write
    write_seq: u64,
    /// Last `write_seq` per key, only kept while someone is watching
    recent_writes: HashMap<String, u64>,
}

impl<V: Clone> MemoryStore<V> {
    // == Constructor ==
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            stats: StatsCollector::new(),
            max_memory_bytes: config.max_memory_bytes,
            max_entries: config.max_entries,
            eviction_threshold: config.eviction_threshold,
            next_seq: 0,
            write_seq: 0,
            recent_writes: HashMap::new(),
        }
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // == Write Log ==
    /// Position in the write log. Pair with [`written_since`](Self::written_since)
    /// to learn whether a key was written while the lock was not held.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Notes a caller write or invalidation of `key`.
    pub fn record_write(&mut self, key: &str) {
        self.write_seq += 1;
        self.recent_writes.insert(key.to_string(), self.write_seq);
    }

    /// True if `key` was recorded after log position `seq`.
    pub fn written_since(&self, key: &str, seq: u64) -> bool {
        self.recent_writes
            .get(key)
            .is_some_and(|&written| written > seq)
    }

    /// Drops the write log once nobody needs it.
    pub fn forget_writes(&mut self) {
        if !self.recent_writes.is_empty() {
            self.recent_writes.clear();
        }
    }

    // == Get ==
    /// Returns a clone of the value if present and live, bumping its access
    /// metadata. An expired entry is removed on the spot.
    ///
    /// Hit/miss accounting is left to the caller, which may still consult
    /// the fallback tier.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = self.entries.get(key)?.is_expired(now);
        if expired {
            self.entries.remove(key);
            debug!(key, "Lazily removed expired entry");
            return None;
        }

        let seq = self.bump_seq();
        let entry = self.entries.get_mut(key)?;
        entry.touch(now, seq);
        Some(entry.value().clone())
    }

    /// True if a live entry exists. Does not count as an access.
    pub fn contains(&self, key: &str, now: Instant) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Borrows the raw entry, expired or not.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    // == Insert ==
    /// Stores `value` under `key`, replacing any prior entry.
    ///
    /// If the value would push the store past a hard limit, least recently
    /// used entries are evicted first. A value larger than the whole memory
    /// budget is rejected; the prior entry for `key` is dropped either way so
    /// a stale value is never served after a newer write.
    pub fn insert(
        &mut self,
        key: String,
        value: V,
        size_bytes: u64,
        ttl: Duration,
        now: Instant,
    ) -> InsertOutcome {
        self.entries.remove(&key);

        if size_bytes > self.max_memory_bytes {
            warn!(
                key = %key,
                size_bytes,
                max_memory_bytes = self.max_memory_bytes,
                "Value exceeds memory budget, not cached in memory"
            );
            return InsertOutcome::Rejected;
        }

        let usage = self.usage();
        let evicted = if usage.bytes + size_bytes > self.max_memory_bytes
            || usage.entries + 1 > self.max_entries
        {
            self.evict_lru(size_bytes, 1)
        } else {
            0
        };

        let seq = self.bump_seq();
        self.entries
            .insert(key, CacheEntry::new(value, ttl, size_bytes, now, seq));

        InsertOutcome::Stored { evicted }
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.remove(key)
    }

    // == Purge Expired ==
    /// Removes every entry expired at `now`. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    // == Evict LRU ==
    /// Evicts least recently used entries down to the hysteresis band,
    /// keeping room for `reserve_bytes` / `reserve_entries` more.
    pub fn evict_lru(&mut self, reserve_bytes: u64, reserve_entries: usize) -> usize {
        let goal = EvictionGoal::hysteresis(
            self.max_memory_bytes,
            self.max_entries,
            reserve_bytes,
            reserve_entries,
        );
        let victims = LruPolicy::select_victims(&self.entries, self.usage(), goal);

        for key in &victims {
            self.entries.remove(key);
        }

        if !victims.is_empty() {
            self.stats.record_evictions(victims.len() as u64);
            debug!(
                evicted = victims.len(),
                remaining = self.entries.len(),
                "LRU eviction"
            );
        }

        victims.len()
    }

    // == Threshold ==
    /// True once either resource is above `eviction_threshold` of its limit.
    pub fn is_over_threshold(&self) -> bool {
        let usage = self.usage();
        usage.bytes as f64 > self.max_memory_bytes as f64 * self.eviction_threshold
            || usage.entries as f64 > self.max_entries as f64 * self.eviction_threshold
    }

    // == Cleanup ==
    /// One sweep: drop expired entries, then evict if still above threshold.
    pub fn cleanup(&mut self, now: Instant) -> CleanupReport {
        let expired = self.purge_expired(now);
        let evicted = if self.is_over_threshold() {
            self.evict_lru(0, 0)
        } else {
            0
        };
        self.stats.record_cleanup_run();

        CleanupReport { expired, evicted }
    }

    // == Usage ==
    /// Usage recomputed from the live map.
    pub fn usage(&self) -> Usage {
        Usage {
            bytes: self.entries.values().map(CacheEntry::size_bytes).sum(),
            entries: self.entries.len(),
        }
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.stats
            .snapshot(self.usage(), self.max_memory_bytes, self.max_entries)
    }

    pub fn stats_mut(&mut self) -> &mut StatsCollector {
        &mut self.stats
    }

    // == Clear ==
    /// Drops all entries and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.reset();
        self.next_seq = 0;
        self.forget_writes();
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &HashMap<String, CacheEntry<V>> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
