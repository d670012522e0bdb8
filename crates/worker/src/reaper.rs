//! Stale-claim reaper.
//!
//! A worker process that dies mid-task leaves its claim in `running`
//! forever. The reaper periodically marks such claims as worker
//! failures so their jobs reach a terminal, observable state.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use simgate_db::repositories::TaskRepo;
use simgate_db::DbPool;

/// A claim older than this with no terminal state means the worker died.
pub const STALE_CLAIM_TIMEOUT_SECS: u64 = 600;

/// How often the reaper scans for stale claims.
pub const REAP_CHECK_INTERVAL_SECS: u64 = 30;

/// Background stale-claim scan loop.
pub struct StaleClaimReaper {
    pool: DbPool,
    stale_after: Duration,
    interval: Duration,
}

impl StaleClaimReaper {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            stale_after: Duration::from_secs(STALE_CLAIM_TIMEOUT_SECS),
            interval: Duration::from_secs(REAP_CHECK_INTERVAL_SECS),
        }
    }

    /// Override the staleness threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Run the scan loop until the cancellation token is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(
            stale_after_secs = self.stale_after.as_secs(),
            "Stale-claim reaper started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Stale-claim reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match TaskRepo::reap_stale(&self.pool, self.stale_after.as_secs_f64()).await {
                        Ok(reaped) if !reaped.is_empty() => {
                            for job_id in &reaped {
                                tracing::warn!(job_id = %job_id, "Reaped stale claim");
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::error!(error = %err, "Stale-claim scan failed");
                        }
                    }
                }
            }
        }
    }
}
