//! Memory Store Module
//!
//! In-process [`Store`] backed by a HashMap, with TTL expiry, LRU eviction
//! and per-key writer locks. Every handle returned by `descend` shares the
//! same state, so proxies at any depth coordinate through one store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::{
    current_timestamp_ms, duration_ms, Bundle, CacheEntry, CacheStats, Store, PATH_SEPARATOR,
};

/// Upper bound on one condvar sleep, so expired locks are noticed while waiting
const WAIT_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    /// Locked keys and their expiry (Unix milliseconds)
    locks: HashMap<String, u64>,
    stats: CacheStats,
    /// Monotonic access counter used for LRU ordering
    tick: u64,
}

impl State {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn is_locked(&self, key: &str, now: u64) -> bool {
        self.locks.get(key).is_some_and(|&expires| expires > now)
    }

    fn has_fresh(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(CacheEntry::is_fresh)
    }

    fn evict_lru(&mut self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                self.stats.record_eviction();
                debug!(key = %key, "Evicted least recently used entry");
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    /// Signalled whenever a lock is cleared by `set` or `release`
    unlocked: Condvar,
    max_entries: usize,
    lock_ttl: Duration,
    wait_timeout: Duration,
}

// == Memory Store ==
/// Shared in-memory cache store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    /// Namespace prefix of this handle; empty at the root
    namespace: String,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store.
    ///
    /// # Arguments
    /// * `max_entries` - Capacity across all namespaces (at least 1)
    /// * `lock_ttl` - Age after which an unreleased lock is ignored
    /// * `wait_timeout` - How long `wait` blocks before giving up
    pub fn new(max_entries: usize, lock_ttl: Duration, wait_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                unlocked: Condvar::new(),
                max_entries: max_entries.max(1),
                lock_ttl,
                wait_timeout,
            }),
            namespace: String::new(),
        }
    }

    /// Creates a store from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_entries, config.lock_ttl(), config.wait_timeout())
    }

    /// Full key of `path` under this handle's namespace.
    ///
    /// Each segment is percent-encoded before joining, so a segment that
    /// itself contains the separator never aliases a deeper namespace.
    fn key(&self, path: &str) -> String {
        let segment = urlencoding::encode(path);
        if self.namespace.is_empty() {
            segment.into_owned()
        } else {
            format!("{}{}{}", self.namespace, PATH_SEPARATOR, segment)
        }
    }

    // == Invalidate ==
    /// Removes the entry at `path`. Returns whether one was present.
    pub fn invalidate(&self, path: &str) -> bool {
        let key = self.key(path);
        let mut state = self.shared.state.lock();
        let removed = state.entries.remove(&key).is_some();
        let count = state.entries.len();
        state.stats.set_total_entries(count);
        removed
    }

    /// Returns whether a writer currently holds the lock for `path`.
    pub fn is_locked(&self, path: &str) -> bool {
        let key = self.key(path);
        self.shared
            .state
            .lock()
            .is_locked(&key, current_timestamp_ms())
    }

    // == Cleanup Expired ==
    /// Removes stale entries and expired locks across all namespaces.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut state = self.shared.state.lock();

        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_fresh());
        state.locks.retain(|_, expires| *expires > now);

        let count = state.entries.len();
        state.stats.set_total_entries(count);
        before - count
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    /// Number of entries across all namespaces.
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get_if_fresh(&self, path: &str) -> Result<Option<Bundle>> {
        let key = self.key(path);
        let mut state = self.shared.state.lock();
        let tick = state.next_tick();

        let fresh = match state.entries.get_mut(&key) {
            Some(entry) if entry.is_fresh() => {
                entry.last_access = tick;
                Some(entry.bundle.clone())
            }
            _ => None,
        };

        if fresh.is_some() {
            state.stats.record_hit();
        } else {
            state.stats.record_miss();
            if state.entries.remove(&key).is_some() {
                let count = state.entries.len();
                state.stats.set_total_entries(count);
            }
        }
        Ok(fresh)
    }

    fn get(&self, path: &str) -> Result<Bundle> {
        let key = self.key(path);
        let mut state = self.shared.state.lock();
        let tick = state.next_tick();

        match state.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_access = tick;
                let bundle = entry.bundle.clone();
                state.stats.record_hit();
                Ok(bundle)
            }
            None => Err(CacheError::StoreUnavailable(format!(
                "No entry at '{}'",
                key
            ))),
        }
    }

    fn set(&self, path: &str, bundle: Bundle, ttl: Duration) -> Result<()> {
        let key = self.key(path);
        let mut state = self.shared.state.lock();
        let tick = state.next_tick();

        let is_overwrite = state.entries.contains_key(&key);
        if !is_overwrite {
            while state.entries.len() >= self.shared.max_entries && state.evict_lru() {}
        }

        state.entries.insert(key.clone(), CacheEntry::new(bundle, ttl, tick));
        state.locks.remove(&key);
        let count = state.entries.len();
        state.stats.set_total_entries(count);
        drop(state);

        self.shared.unlocked.notify_all();
        Ok(())
    }

    fn lock(&self, path: &str) -> Result<bool> {
        let key = self.key(path);
        let now = current_timestamp_ms();
        let mut state = self.shared.state.lock();

        // A racer that missed before the entry landed reuses it instead
        // of computing a second time.
        let acquired = !state.is_locked(&key, now) && !state.has_fresh(&key);
        if acquired {
            let expires = now.saturating_add(duration_ms(self.shared.lock_ttl));
            state.locks.insert(key, expires);
        }
        state.stats.record_lock(acquired);
        Ok(acquired)
    }

    fn wait(&self, path: &str) -> Result<bool> {
        let key = self.key(path);
        let deadline = Instant::now() + self.shared.wait_timeout;
        let mut state = self.shared.state.lock();

        while state.is_locked(&key, current_timestamp_ms()) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(WAIT_SLICE);
            self.shared.unlocked.wait_for(&mut state, slice);
        }

        let fresh = state.has_fresh(&key);
        if !fresh {
            state.stats.record_wait_timeout();
        }
        Ok(fresh)
    }

    fn release(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        let removed = self.shared.state.lock().locks.remove(&key).is_some();
        if removed {
            self.shared.unlocked.notify_all();
        }
        Ok(())
    }

    fn descend(&self, segment: &str) -> Arc<dyn Store> {
        Arc::new(MemoryStore {
            shared: Arc::clone(&self.shared),
            namespace: self.key(segment),
        })
    }
}
