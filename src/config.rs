//! Configuration Module
//!
//! Loads store and caching parameters from environment variables.

use std::env;
use std::time::Duration;

/// Caching configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the memory store can hold
    pub max_entries: usize,
    /// Default TTL in seconds for cached calls
    pub default_ttl: u64,
    /// Seconds after which an unreleased lock is considered abandoned
    pub lock_ttl: u64,
    /// Milliseconds a caller waits for another writer before computing uncached
    pub wait_timeout_ms: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum store entries (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `LOCK_TTL` - Lock expiry in seconds (default: 30)
    /// - `WAIT_TIMEOUT_MS` - Wait timeout in milliseconds (default: 5000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            lock_ttl: env_or("LOCK_TTL", defaults.lock_ttl),
            wait_timeout_ms: env_or("WAIT_TIMEOUT_MS", defaults.wait_timeout_ms),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 300,
            lock_ttl: 30,
            wait_timeout_ms: 5000,
            cleanup_interval: 1,
        }
    }
}
