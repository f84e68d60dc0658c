//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access
//! tracking.

use std::time::Duration;

use tokio::time::Instant;

/// Roughly 30 years; used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// == Cache Entry ==
/// A single cached value with its bookkeeping.
///
/// Value, creation time, expiry and size are fixed at construction. Only the
/// access counter and last-access time move, and only on a successful read.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
    last_accessed_at: Instant,
    size_bytes: u64,
    /// Store-wide sequence number of the last insert or read, orders entries
    /// whose `last_accessed_at` are equal
    access_seq: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` after `now`.
    pub fn new(value: V, ttl: Duration, size_bytes: u64, now: Instant, seq: u64) -> Self {
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);

        Self {
            value,
            created_at: now,
            expires_at,
            access_count: 0,
            last_accessed_at: now,
            size_bytes,
            access_seq: seq,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    pub fn last_accessed_at(&self) -> Instant {
        self.last_accessed_at
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub(crate) fn access_seq(&self) -> u64 {
        self.access_seq
    }

    // == Is Expired ==
    /// An entry is still live at exactly `expires_at` and expired strictly
    /// after it.
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    // == Touch ==
    /// Records a successful read.
    pub(crate) fn touch(&mut self, now: Instant, seq: u64) {
        self.access_count += 1;
        self.last_accessed_at = now;
        self.access_seq = seq;
    }
}
