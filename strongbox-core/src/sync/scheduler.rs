//! Periodic background sync.

use crate::rpc::CallContext;
use crate::session::ClientSession;
use crate::sync::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default period between background sync cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Spawn a task that runs a sync cycle every `interval` until `shutdown`.
///
/// A tick is skipped silently while no key is loaded or while the server is
/// believed unreachable; an offline client probes the server once per tick.
/// Failed cycles are logged and retried on the next tick.
pub fn spawn_periodic_sync(
    engine: Arc<SyncEngine>,
    session: Arc<ClientSession>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !session.is_logged_in() {
                continue;
            }
            let remote = engine.remote();
            if !remote.connectivity().is_online() && !remote.probe().await {
                tracing::debug!("Server unreachable, skipping sync");
                continue;
            }

            let cx = CallContext::with_cancellation(shutdown.child_token());
            match engine.sync(&cx).await {
                Ok(report) => tracing::debug!("Background sync finished: {:?}", report),
                Err(e) => tracing::warn!("Background sync failed: {}", e),
            }
        }
        tracing::debug!("Periodic sync stopped");
    })
}
