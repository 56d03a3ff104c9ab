//! Expired-Entry Purge Task
//!
//! Background task that periodically drops expired entries from an output
//! cache. Lazy expiry on access stays authoritative; this only reclaims
//! memory held by keys nobody reads anymore.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::provider::Cache;

/// Spawns a background task that purges expired entries from `cache`.
///
/// The task runs until aborted, sleeping for `interval` between passes.
///
/// # Arguments
/// * `cache` - the output cache to purge
/// * `interval` - time between purge passes
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it on shutdown.
///
/// # Example
/// ```ignore
/// let cache = provider.get_cache(&application)?;
/// let purge_handle = spawn_purge_task(cache.clone(), config.purge_interval);
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task(cache: Arc<dyn Cache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expired-entry purge task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired();
            if removed > 0 {
                info!(removed, "Purge: removed expired entries");
            } else {
                debug!("Purge: no expired entries found");
            }
        }
    })
}
