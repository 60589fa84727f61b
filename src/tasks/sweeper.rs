//! Expiration Sweeper Task
//!
//! Background task that periodically removes expired cache entries, so
//! entries that are never read again still leave the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Floor for the sweep interval, so a zero interval cannot spin on the lock.
pub const MIN_SWEEP_TICK: Duration = Duration::from_millis(10);

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task sleeps for `interval` (at least `MIN_SWEEP_TICK`) between full scans. Each scan runs under
/// the store's write lock without awaiting, so aborting the task can only
/// interrupt it between scans, never halfway through one.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(CacheStore::new(CacheConfig::default())));
/// let sweeper = spawn_sweeper_task(store.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper_task(store: Arc<RwLock<CacheStore>>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(MIN_SWEEP_TICK);
    tokio::spawn(async move {
        info!("Starting expiration sweeper with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut guard = store.write().await;
                guard.cleanup_expired()
            };

            if removed == 0 {
                debug!("Expiration sweep: no expired entries found");
            }
        }
    })
}
