//! TTL Cleanup Task
//!
//! Background task that periodically purges stale entries and expired locks
//! from a [`MemoryStore`]. Stale entries are never served anyway; this only
//! bounds memory held by keys nobody reads again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::{duration_ms, MemoryStore};

/// Spawns a background task that periodically cleans up `store`.
///
/// The store's state is shared by every handle, so cleaning through the root
/// handle covers all namespaces. Returns the task handle so it can be aborted
/// on shutdown.
///
/// # Example
/// ```ignore
/// let store = MemoryStore::from_config(&config);
/// let cleanup_handle = spawn_cleanup_task(store.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(store: MemoryStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = duration_ms(interval),
            "Starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            // The store lock is held only briefly, so this runs inline
            let removed = store.cleanup_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} stale entries", removed);
            } else {
                debug!("TTL cleanup: no stale entries found");
            }
        }
    })
}
