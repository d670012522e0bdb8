//! Repository for the `tasks` table.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so that multiple worker
//! processes pulling from the same queues never double-claim a task.

use sqlx::PgPool;

use simgate_core::request::JobRequest;
use simgate_core::types::JobId;

use crate::models::task::{TaskRow, TaskState};

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    job_id, owner, application, action, queue_name, task_name, kwargs, \
    state, failure_reason, claimed_by, submitted_at, claimed_at, finished_at";

/// Provides broker operations for queued tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Enqueue a task. Returns immediately; execution happens when a
    /// worker claims the row.
    pub async fn enqueue(
        pool: &PgPool,
        request: &JobRequest,
        queue_name: &str,
        task_name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO tasks (job_id, owner, application, action, queue_name, task_name, kwargs, state) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(request.job_id)
        .bind(&request.owner)
        .bind(&request.application)
        .bind(request.action.as_str())
        .bind(queue_name)
        .bind(task_name)
        .bind(serde_json::Value::Object(request.kwargs.clone()))
        .bind(TaskState::Pending.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Atomically claim the oldest pending task on any of the given
    /// queues for a worker.
    pub async fn claim_next(
        pool: &PgPool,
        queues: &[String],
        worker: &str,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks \
             SET state = $1, claimed_by = $2, claimed_at = NOW() \
             WHERE job_id = ( \
                 SELECT job_id FROM tasks \
                 WHERE state = $3 AND queue_name = ANY($4) \
                 ORDER BY submitted_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(TaskState::Running.id())
            .bind(worker)
            .bind(TaskState::Pending.id())
            .bind(queues)
            .fetch_optional(pool)
            .await
    }

    /// Mark a task terminal with an envelope stored in the result store.
    pub async fn mark_done(pool: &PgPool, job_id: JobId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET state = $2, finished_at = NOW() WHERE job_id = $1")
            .bind(job_id)
            .bind(TaskState::Done.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark a task terminal with an infrastructure failure and no
    /// envelope. The adapter synthesizes a `WORKER_FAILURE` envelope
    /// from `reason` at fetch time.
    pub async fn mark_worker_failure(
        pool: &PgPool,
        job_id: JobId,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET state = $2, failure_reason = $3, finished_at = NOW() \
             WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(TaskState::WorkerFailure.id())
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Revoke a task that no worker has claimed yet.
    ///
    /// Returns `false` if the task was already claimed or terminal.
    pub async fn revoke(pool: &PgPool, job_id: JobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET state = $2, finished_at = NOW() \
             WHERE job_id = $1 AND state = $3",
        )
        .bind(job_id)
        .bind(TaskState::Revoked.id())
        .bind(TaskState::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Look up a task row by job id.
    pub async fn find(pool: &PgPool, job_id: JobId) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE job_id = $1");
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// Number of pending tasks on a queue, reported at submission.
    pub async fn queue_length(pool: &PgPool, queue_name: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE queue_name = $1 AND state = $2",
        )
        .bind(queue_name)
        .bind(TaskState::Pending.id())
        .fetch_one(pool)
        .await
    }

    /// Mark running tasks whose claim is older than `stale_after_secs`
    /// as worker failures (the claiming worker died without finishing).
    ///
    /// Returns the job ids that were reaped.
    pub async fn reap_stale(
        pool: &PgPool,
        stale_after_secs: f64,
    ) -> Result<Vec<JobId>, sqlx::Error> {
        sqlx::query_scalar::<_, JobId>(
            "UPDATE tasks \
             SET state = $1, failure_reason = 'worker stopped responding', finished_at = NOW() \
             WHERE state = $2 AND claimed_at < NOW() - make_interval(secs => $3) \
             RETURNING job_id",
        )
        .bind(TaskState::WorkerFailure.id())
        .bind(TaskState::Running.id())
        .bind(stale_after_secs)
        .fetch_all(pool)
        .await
    }
}
