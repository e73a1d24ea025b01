//! Background cleanup: prune expired sessions.

use crate::storage::RemoteStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

pub fn spawn_cleanup_task(storage: RemoteStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            match run_cleanup(&storage) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Pruned expired sessions"),
                Err(e) => tracing::error!("Cleanup error: {}", e),
            }
        }
    })
}

pub fn run_cleanup(storage: &RemoteStore) -> Result<usize, String> {
    let now = chrono::Utc::now().timestamp();
    storage
        .delete_expired_sessions(now)
        .map_err(|e| e.to_string())
}
