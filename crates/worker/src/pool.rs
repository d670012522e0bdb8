//! Worker claim-and-execute loops.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use simgate_core::model::ModelRegistry;
use simgate_core::request::{Action, Kwargs};
use simgate_core::wrapper;
use simgate_db::models::TaskRow;
use simgate_db::repositories::{ResultRepo, TaskRepo};
use simgate_db::DbPool;

use crate::config::WorkerConfig;

/// A fixed-size pool of claim loops over the broker queues.
pub struct WorkerPool {
    pool: DbPool,
    models: Arc<ModelRegistry>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(pool: DbPool, models: Arc<ModelRegistry>, config: WorkerConfig) -> Self {
        Self {
            pool,
            models,
            config,
        }
    }

    /// Run all worker loops until the cancellation token is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        let this = Arc::new(self);
        tracing::info!(
            concurrency = this.config.concurrency,
            queues = ?this.config.queues,
            soft_time_limit_secs = this.config.soft_time_limit.as_secs(),
            "Worker pool started",
        );

        let mut handles = Vec::with_capacity(this.config.concurrency);
        for slot in 0..this.config.concurrency {
            let this = Arc::clone(&this);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                this.worker_loop(slot, cancel).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("Worker pool stopped");
    }

    /// One claim loop: claim, execute, repeat. A claimed task is always
    /// driven to a terminal broker state.
    async fn worker_loop(&self, slot: usize, cancel: CancellationToken) {
        let worker_name = format!("{}-{slot}", self.config.worker_name);

        loop {
            if cancel.is_cancelled() {
                tracing::info!(worker = %worker_name, "Worker loop shutting down");
                break;
            }

            match TaskRepo::claim_next(&self.pool, &self.config.queues, &worker_name).await {
                Ok(Some(task)) => {
                    self.execute(&worker_name, task).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(err) => {
                    tracing::error!(worker = %worker_name, error = %err, "Claim failed");
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }
    }

    /// Execute one claimed task and record its terminal state.
    async fn execute(&self, worker_name: &str, task: TaskRow) {
        let job_id = task.job_id;
        tracing::info!(
            worker = %worker_name,
            job_id = %job_id,
            task_name = %task.task_name,
            "Task claimed",
        );

        let Ok(action) = task.action.parse::<Action>() else {
            // Rows are written by the router, so this means schema skew.
            let envelope = simgate_core::envelope::ResultEnvelope::failure(
                job_id,
                format!("Unknown action in task row: {}", task.action),
                0.0,
            );
            self.finish(job_id, envelope).await;
            return;
        };

        let kwargs: Kwargs = match task.kwargs {
            serde_json::Value::Object(map) => map,
            _ => Kwargs::new(),
        };

        let envelope = match self.models.resolve(&task.owner, &task.application, action) {
            Some(model) => {
                let run = wrapper::run_wrapped(job_id, &model, kwargs);
                match tokio::time::timeout(self.config.soft_time_limit, run).await {
                    Ok(envelope) => envelope,
                    Err(_) => {
                        // Soft time limit exceeded: no envelope exists.
                        // The adapter synthesizes WORKER_FAILURE at fetch.
                        tracing::warn!(
                            job_id = %job_id,
                            limit_secs = self.config.soft_time_limit.as_secs(),
                            "Soft time limit exceeded",
                        );
                        let reason = format!(
                            "soft time limit of {}s exceeded",
                            self.config.soft_time_limit.as_secs()
                        );
                        if let Err(err) =
                            TaskRepo::mark_worker_failure(&self.pool, job_id, &reason).await
                        {
                            tracing::error!(job_id = %job_id, error = %err, "Failed to record worker failure");
                        }
                        return;
                    }
                }
            }
            None => wrapper::unresolved_model(job_id, &task.owner, &task.application, &task.action),
        };

        self.finish(job_id, envelope).await;
    }

    /// Store the envelope and mark the task done.
    async fn finish(
        &self,
        job_id: simgate_core::types::JobId,
        envelope: simgate_core::envelope::ResultEnvelope,
    ) {
        let status = envelope.status;
        if let Err(err) = ResultRepo::store(&self.pool, &envelope).await {
            tracing::error!(job_id = %job_id, error = %err, "Failed to store envelope");
        }
        if let Err(err) = TaskRepo::mark_done(&self.pool, job_id).await {
            tracing::error!(job_id = %job_id, error = %err, "Failed to mark task done");
        }
        tracing::info!(job_id = %job_id, status = ?status, "Task finished");
    }
}
