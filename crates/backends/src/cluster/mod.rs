//! Cluster-submission adapter.
//!
//! Submits a job to the cluster scheduler under a deterministic future
//! key and registers a completion continuation that is guaranteed to run
//! exactly once per submission, whatever the outcome. This is the
//! mechanism that makes Completion Delivery happen even on failure. A
//! watcher task polls the future until terminal and fires the
//! continuation with the fetched envelope, or with a synthesized
//! `WORKER_FAILURE` when the future died without one.
//!
//! There is no cancellation primitive: once submitted, a cluster job
//! runs to completion or failure.

pub mod client;
pub mod continuation;

use std::sync::Arc;
use std::time::{Duration, Instant};

use simgate_core::envelope::ResultEnvelope;
use simgate_core::request::JobRequest;
use simgate_core::router::cluster_future_key;
use simgate_core::types::JobId;
use simgate_delivery::CompletionDelivery;

use crate::error::BackendError;
use crate::{FetchOutcome, PollState};

pub use client::{
    ClusterJobSpec, FutureState, HttpScheduler, LocalScheduler, SchedulerClient, SchedulerError,
};
pub use continuation::Continuation;

/// Watcher polling interval.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Consecutive scheduler poll errors (or unknown-key responses) the
/// watcher tolerates before declaring the future lost.
const MAX_CONSECUTIVE_LOSSES: u32 = 5;

/// Adapter for the cluster-submission backend.
pub struct ClusterBackend {
    scheduler: Arc<dyn SchedulerClient>,
    delivery: Arc<CompletionDelivery>,
    poll_interval: Duration,
}

impl ClusterBackend {
    pub fn new(scheduler: Arc<dyn SchedulerClient>, delivery: Arc<CompletionDelivery>) -> Self {
        Self {
            scheduler,
            delivery,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the watcher polling interval (tests).
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Submit a job and register its completion continuation.
    pub async fn submit(
        &self,
        request: &JobRequest,
        future_key: &str,
        timeout_secs: Option<u64>,
    ) -> Result<(), BackendError> {
        let spec = ClusterJobSpec {
            job_id: request.job_id,
            owner: request.owner.clone(),
            application: request.application.clone(),
            action: request.action,
            kwargs: request.kwargs.clone(),
            timeout_secs,
        };

        self.scheduler
            .submit(future_key, &spec)
            .await
            .map_err(|e| BackendError::Scheduler(e.to_string()))?;

        tracing::info!(
            job_id = %request.job_id,
            future_key,
            "Job submitted to cluster scheduler",
        );

        // The continuation delivers the envelope upstream; push failures
        // degrade to logged warnings and never alter the terminal state.
        let delivery = Arc::clone(&self.delivery);
        let owner = request.owner.clone();
        let application = request.application.clone();
        let action = request.action;
        let continuation = Continuation::new(move |envelope: ResultEnvelope| {
            let delivery = Arc::clone(&delivery);
            let owner = owner.clone();
            let application = application.clone();
            async move {
                let _ = delivery
                    .deliver(&owner, &application, action, envelope)
                    .await;
            }
        });

        tokio::spawn(watch_future(
            Arc::clone(&self.scheduler),
            future_key.to_string(),
            request.job_id,
            continuation,
            self.poll_interval,
        ));

        Ok(())
    }

    /// Coarse state, resolved statelessly from the deterministic key.
    pub async fn poll(&self, job_id: JobId) -> Result<PollState, BackendError> {
        let key = cluster_future_key(job_id);
        let state = self
            .scheduler
            .state(&key)
            .await
            .map_err(|e| BackendError::Scheduler(e.to_string()))?;

        match state {
            FutureState::Pending | FutureState::Unknown => Ok(PollState::Pending),
            FutureState::Errored => Ok(PollState::Fail),
            FutureState::Finished => {
                let envelope = self
                    .scheduler
                    .fetch(&key)
                    .await
                    .map_err(|e| BackendError::Scheduler(e.to_string()))?;
                Ok(match envelope {
                    Some(env) if env.status.is_success() => PollState::Success,
                    _ => PollState::Fail,
                })
            }
        }
    }

    /// Fetch the terminal envelope held by the scheduler.
    pub async fn fetch(&self, job_id: JobId) -> Result<FetchOutcome, BackendError> {
        let key = cluster_future_key(job_id);
        let state = self
            .scheduler
            .state(&key)
            .await
            .map_err(|e| BackendError::Scheduler(e.to_string()))?;

        match state {
            FutureState::Pending | FutureState::Unknown => Ok(FetchOutcome::NotReady),
            FutureState::Errored => Ok(FetchOutcome::Ready(ResultEnvelope::worker_failure(
                job_id,
                "cluster future died without producing a result",
            ))),
            FutureState::Finished => {
                let envelope = self
                    .scheduler
                    .fetch(&key)
                    .await
                    .map_err(|e| BackendError::Scheduler(e.to_string()))?;
                Ok(match envelope {
                    Some(env) => FetchOutcome::Ready(env),
                    None => FetchOutcome::Ready(ResultEnvelope::worker_failure(
                        job_id,
                        "cluster future finished without an envelope",
                    )),
                })
            }
        }
    }
}

/// Poll a future until terminal, then fire its continuation exactly once.
///
/// Runs decoupled from the submitting request, on the adapter's own
/// task. The continuation layer appends its own elapsed time to the
/// envelope's task-time sequence.
async fn watch_future(
    scheduler: Arc<dyn SchedulerClient>,
    key: String,
    job_id: JobId,
    continuation: Continuation,
    poll_interval: Duration,
) {
    let submitted = Instant::now();
    let mut losses: u32 = 0;

    let mut envelope = loop {
        tokio::time::sleep(poll_interval).await;

        let state = match scheduler.state(&key).await {
            Ok(state) => state,
            Err(err) => {
                losses += 1;
                tracing::warn!(key = %key, error = %err, losses, "Scheduler poll failed");
                if losses >= MAX_CONSECUTIVE_LOSSES {
                    break ResultEnvelope::worker_failure(
                        job_id,
                        format!("lost contact with cluster scheduler: {err}"),
                    );
                }
                continue;
            }
        };

        match state {
            FutureState::Pending => {
                losses = 0;
            }
            FutureState::Unknown => {
                // The scheduler forgot a key we just submitted; a few
                // unknowns in a row mean the future is gone.
                losses += 1;
                if losses >= MAX_CONSECUTIVE_LOSSES {
                    break ResultEnvelope::worker_failure(
                        job_id,
                        "cluster future disappeared before completion",
                    );
                }
            }
            FutureState::Errored => {
                break ResultEnvelope::worker_failure(
                    job_id,
                    "cluster future died without producing a result",
                );
            }
            FutureState::Finished => match scheduler.fetch(&key).await {
                Ok(Some(envelope)) => break envelope,
                Ok(None) => {
                    break ResultEnvelope::worker_failure(
                        job_id,
                        "cluster future finished without an envelope",
                    );
                }
                Err(err) => {
                    losses += 1;
                    tracing::warn!(key = %key, error = %err, losses, "Scheduler fetch failed");
                    if losses >= MAX_CONSECUTIVE_LOSSES {
                        break ResultEnvelope::worker_failure(
                            job_id,
                            format!("could not retrieve cluster result: {err}"),
                        );
                    }
                }
            },
        }
    };

    envelope.push_task_time(submitted.elapsed().as_secs_f64());
    continuation.complete(envelope).await;
}
