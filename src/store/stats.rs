//! Cache Statistics Module
//!
//! Counters for reads, evictions and lock contention in the memory store.

use serde::Serialize;

// == Cache Stats ==
/// Memory store counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh entries served
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Entries evicted to stay within capacity
    pub evictions: u64,
    /// Locks granted to a writer
    pub locks_acquired: u64,
    /// Lock attempts refused because of a live lock or fresh entry
    pub locks_denied: u64,
    /// Waits that ended without a fresh entry
    pub wait_timeouts: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_lock(&mut self, acquired: bool) {
        if acquired {
            self.locks_acquired += 1;
        } else {
            self.locks_denied += 1;
        }
    }

    pub fn record_wait_timeout(&mut self) {
        self.wait_timeouts += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
