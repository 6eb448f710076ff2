//! Periodic eviction of abandoned import sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::sessions::SessionManager;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the sweep loop until `cancel` is triggered.
///
/// Sessions untouched for `idle_timeout` are dropped; sessions with a commit
/// in flight are never touched.
pub async fn run(sessions: Arc<SessionManager>, idle_timeout: Duration, cancel: CancellationToken) {
    tracing::info!(
        idle_timeout_secs = idle_timeout.as_secs(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Session sweeper started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let removed = sessions.sweep_idle(idle_timeout).await;
                if removed > 0 {
                    tracing::info!(removed, "Session sweeper: discarded idle imports");
                } else {
                    tracing::debug!("Session sweeper: nothing to discard");
                }
            }
        }
    }
}
