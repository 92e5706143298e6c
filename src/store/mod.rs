//! Store Module
//!
//! The contract a cache backend must satisfy for the proxy, plus an
//! in-memory implementation with TTL expiry, LRU eviction and per-key locks.

mod entry;
mod memory;
mod stats;

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::value::Value;

pub use entry::{current_timestamp_ms, CacheEntry};
pub(crate) use entry::duration_ms;
pub use memory::MemoryStore;
pub use stats::CacheStats;

// == Public Constants ==
/// Separator between namespace segments in store paths
pub const PATH_SEPARATOR: char = '/';

// == Bundle ==
/// Captured output and return value of one call, stored and replayed as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub output: String,
    pub value: Value,
}

impl Bundle {
    pub fn new(output: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            value: value.into(),
        }
    }
}

// == Store Trait ==
/// Cache backend used by proxies.
///
/// Every path is relative to the handle's namespace. `lock` must be mutually
/// exclusive per path across all callers sharing the backend, and `wait` may
/// only report success once the lock holder has called `set`.
pub trait Store: Send + Sync {
    /// Returns the entry at `path` if present and within its TTL.
    fn get_if_fresh(&self, path: &str) -> Result<Option<Bundle>>;

    /// Returns the entry at `path`. Only called after a successful `wait`.
    fn get(&self, path: &str) -> Result<Bundle>;

    fn set(&self, path: &str, bundle: Bundle, ttl: Duration) -> Result<()>;

    /// Tries to become the single writer for `path`. True when acquired.
    fn lock(&self, path: &str) -> Result<bool>;

    /// Blocks until the current writer for `path` has finished or the
    /// backend's wait timeout elapses. True when a fresh entry is available.
    fn wait(&self, path: &str) -> Result<bool>;

    /// Gives up a lock without writing, after a failed compute.
    fn release(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// Returns a handle scoped beneath `segment`.
    fn descend(&self, segment: &str) -> Arc<dyn Store>;
}
