//! LRU Eviction Module
//!
//! Picks eviction victims by least-recent access once the store is under
//! memory or entry pressure.

use std::collections::HashMap;

use crate::cache::CacheEntry;

/// Eviction drains usage down to this percentage of each hard limit, so that
/// a burst of inserts does not trigger a new eviction round every time.
pub const HYSTERESIS_PERCENT: u64 = 70;

// == Usage ==
/// Point-in-time resource usage of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub bytes: u64,
    pub entries: usize,
}

// == Eviction Goal ==
/// Usage that an eviction round must reach before it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionGoal {
    pub target_bytes: u64,
    pub target_entries: usize,
}

impl EvictionGoal {
    /// Goal at [`HYSTERESIS_PERCENT`] of both limits, tightened further so that
    /// `reserve_bytes` / `reserve_entries` still fit under the hard limits.
    pub fn hysteresis(
        max_bytes: u64,
        max_entries: usize,
        reserve_bytes: u64,
        reserve_entries: usize,
    ) -> Self {
        let band_bytes = percent_of(max_bytes, HYSTERESIS_PERCENT);
        let band_entries = percent_of(max_entries as u64, HYSTERESIS_PERCENT) as usize;

        Self {
            target_bytes: band_bytes.min(max_bytes.saturating_sub(reserve_bytes)),
            target_entries: band_entries.min(max_entries.saturating_sub(reserve_entries)),
        }
    }

    pub fn is_met(&self, usage: Usage) -> bool {
        usage.bytes <= self.target_bytes && usage.entries <= self.target_entries
    }
}

/// `percent`% of `value`, rounded down.
fn percent_of(value: u64, percent: u64) -> u64 {
    (u128::from(value) * u128::from(percent) / 100) as u64
}

// == LRU Policy ==
/// Least-recently-used victim selection.
///
/// Entries are ranked by `last_accessed_at`, ties going to the entry whose
/// last insert or read happened first. The result depends only on the access
/// trace, so the same trace always yields the same victims.
#[derive(Debug, Clone, Copy, Default)]
pub struct LruPolicy;

impl LruPolicy {
    /// Returns all keys, least recently used first.
    pub fn rank<V>(entries: &HashMap<String, CacheEntry<V>>) -> Vec<&String> {
        let mut ranked: Vec<(&String, &CacheEntry<V>)> = entries.iter().collect();
        ranked.sort_by_key(|(_, entry)| (entry.last_accessed_at(), entry.access_seq()));
        ranked.into_iter().map(|(key, _)| key).collect()
    }

    // == Select Victims ==
    /// Picks keys from the front of the LRU order until removing them brings
    /// `usage` down to `goal`.
    pub fn select_victims<V>(
        entries: &HashMap<String, CacheEntry<V>>,
        mut usage: Usage,
        goal: EvictionGoal,
    ) -> Vec<String> {
        let mut victims = Vec::new();

        for key in Self::rank(entries) {
            if goal.is_met(usage) {
                break;
            }
            if let Some(entry) = entries.get(key) {
                usage.bytes = usage.bytes.saturating_sub(entry.size_bytes());
                usage.entries = usage.entries.saturating_sub(1);
                victims.push(key.clone());
            }
        }

        victims
    }
}
