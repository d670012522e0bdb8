//! Periodic project-registry refresh.
//!
//! Refresh is an explicit operation on a long-lived task, never an
//! import-time or mid-request side effect. A failed refresh keeps the
//! previous snapshot and logs the error.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use simgate_core::registry::ProjectRegistry;

/// Background registry refresh loop.
pub struct RegistryRefresher {
    registry: Arc<ProjectRegistry>,
    interval: Duration,
}

impl RegistryRefresher {
    pub fn new(registry: Arc<ProjectRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Run the refresh loop until the cancellation token is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; the registry was loaded at
        // startup, so skip it.
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Registry refresher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Registry refresher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.registry.refresh() {
                        Ok(count) => {
                            tracing::debug!(projects = count, "Registry refreshed");
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "Registry refresh failed, keeping previous snapshot");
                        }
                    }
                }
            }
        }
    }
}
