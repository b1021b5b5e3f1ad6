//! Maintenance Task
//!
//! Background task that periodically purges expired in-process entries and
//! reconciles the session index.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::services::SessionCacheService;

/// What one maintenance pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub purged_entries: usize,
    pub cleaned_sessions: usize,
}

/// Runs one maintenance pass.
pub async fn run_maintenance(
    store: &CacheStore,
    sessions: &SessionCacheService,
) -> Result<MaintenanceReport> {
    let purged_entries = store.purge_expired().await;
    let cleaned_sessions = sessions.clean_expired_sessions().await?;
    Ok(MaintenanceReport {
        purged_entries,
        cleaned_sessions,
    })
}

/// Spawns a background task that runs [`run_maintenance`] every
/// `interval_secs` seconds.
///
/// A failed pass is logged and retried at the next tick. The returned handle
/// is aborted on shutdown.
///
/// # Example
/// ```ignore
/// let store = CacheStore::memory();
/// let sessions = SessionCacheService::new(store.clone());
/// let handle = spawn_maintenance_task(store, sessions, 300);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task(
    store: CacheStore,
    sessions: SessionCacheService,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting maintenance task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match run_maintenance(&store, &sessions).await {
                Ok(report) if report == MaintenanceReport::default() => {
                    debug!("Maintenance: nothing to remove");
                }
                Ok(report) => {
                    info!(
                        "Maintenance: purged {} expired entries, cleaned {} sessions",
                        report.purged_entries, report.cleaned_sessions
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Maintenance pass failed");
                }
            }
        }
    })
}
