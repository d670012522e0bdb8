//! Queue-worker adapter over the Postgres broker.
//!
//! Submission inserts a task row and never blocks on execution; a
//! long-lived worker pool claims and runs the row out of band. Poll and
//! fetch consult the broker's native result store. A task marked
//! `worker_failure` has no stored envelope; the adapter synthesizes a
//! `WORKER_FAILURE` envelope from the recorded reason at fetch time.

use std::time::Duration;

use simgate_core::envelope::ResultEnvelope;
use simgate_core::request::JobRequest;
use simgate_core::types::JobId;
use simgate_db::models::TaskState;
use simgate_db::repositories::{ResultRepo, TaskRepo};
use simgate_db::DbPool;

use crate::error::BackendError;
use crate::{FetchOutcome, PollState, SubmitReceipt};

/// Result-store polling interval for synchronous execution.
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Adapter for the queue-worker backend.
#[derive(Clone)]
pub struct QueueBackend {
    pool: DbPool,
}

impl QueueBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Enqueue a task. Returns immediately with the queue length.
    pub async fn submit(
        &self,
        request: &JobRequest,
        queue_name: &str,
        task_name: &str,
    ) -> Result<SubmitReceipt, BackendError> {
        TaskRepo::enqueue(&self.pool, request, queue_name, task_name).await?;
        let queue_length = TaskRepo::queue_length(&self.pool, queue_name).await?;

        tracing::info!(
            job_id = %request.job_id,
            queue_name,
            task_name,
            queue_length,
            "Task enqueued",
        );

        Ok(SubmitReceipt {
            job_id: request.job_id,
            queue_length: Some(queue_length),
        })
    }

    /// Coarse state from the broker. Unknown job ids are `Pending`:
    /// absence is not failure.
    pub async fn poll(&self, job_id: JobId) -> Result<PollState, BackendError> {
        if let Some(status) = ResultRepo::status(&self.pool, job_id).await? {
            return Ok(if status == "SUCCESS" {
                PollState::Success
            } else {
                PollState::Fail
            });
        }

        match TaskRepo::find(&self.pool, job_id).await? {
            Some(row) => match row.task_state() {
                Some(TaskState::WorkerFailure | TaskState::Revoked) => Ok(PollState::Fail),
                _ => Ok(PollState::Pending),
            },
            None => Ok(PollState::Pending),
        }
    }

    /// Fetch the terminal envelope, synthesizing `WORKER_FAILURE` for
    /// tasks that terminated without one.
    pub async fn fetch(&self, job_id: JobId) -> Result<FetchOutcome, BackendError> {
        if let Some(envelope) = ResultRepo::fetch(&self.pool, job_id).await? {
            return Ok(FetchOutcome::Ready(envelope));
        }

        match TaskRepo::find(&self.pool, job_id).await? {
            Some(row) => match row.task_state() {
                Some(TaskState::WorkerFailure) => {
                    let reason = row
                        .failure_reason
                        .unwrap_or_else(|| "worker failed without detail".to_string());
                    Ok(FetchOutcome::Ready(ResultEnvelope::worker_failure(
                        job_id, reason,
                    )))
                }
                Some(TaskState::Revoked) => Ok(FetchOutcome::Ready(
                    ResultEnvelope::worker_failure(job_id, "task revoked before execution"),
                )),
                _ => Ok(FetchOutcome::NotReady),
            },
            None => Ok(FetchOutcome::NotReady),
        }
    }

    /// Enqueue and block until the envelope appears in the result store.
    ///
    /// Used for the lightweight synchronous actions. No deadline is
    /// enforced at this layer; callers apply their own.
    pub async fn run_sync(
        &self,
        request: &JobRequest,
        queue_name: &str,
        task_name: &str,
    ) -> Result<ResultEnvelope, BackendError> {
        self.submit(request, queue_name, task_name).await?;

        loop {
            match self.fetch(request.job_id).await? {
                FetchOutcome::Ready(envelope) => return Ok(envelope),
                FetchOutcome::NotReady | FetchOutcome::DeliveredUpstream => {
                    tokio::time::sleep(SYNC_POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Revoke a pending task. Returns `false` once a worker has claimed
    /// it or it already terminated.
    pub async fn cancel(&self, job_id: JobId) -> Result<bool, BackendError> {
        let revoked = TaskRepo::revoke(&self.pool, job_id).await?;
        if revoked {
            tracing::info!(job_id = %job_id, "Task revoked");
        }
        Ok(revoked)
    }
}
