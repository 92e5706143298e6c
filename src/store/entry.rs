//! Cache Entry Module
//!
//! A stored bundle together with its expiry and recency metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::store::Bundle;

// == Cache Entry ==
/// A bundle held by the memory store.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored bundle
    pub bundle: Bundle,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Store access tick of the last read or write, for LRU eviction
    pub last_access: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl` from now.
    pub fn new(bundle: Bundle, ttl: Duration, tick: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            bundle,
            created_at: now,
            expires_at: now.saturating_add(duration_ms(ttl)),
            last_access: tick,
        }
    }

    // == Is Fresh ==
    /// An entry is stale once the current time reaches its expiration time,
    /// so a zero TTL yields an entry that is never served.
    pub fn is_fresh(&self) -> bool {
        current_timestamp_ms() < self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, zero once stale.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
