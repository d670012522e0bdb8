//! Repository for the `task_results` table, the queue's native result
//! store.
//!
//! One terminal envelope per job id: `store` is insert-if-absent, so the
//! first write wins and a retried terminal transition cannot overwrite
//! an observed result.

use sqlx::PgPool;

use simgate_core::envelope::ResultEnvelope;
use simgate_core::types::JobId;

/// Provides read/write access to terminal envelopes.
pub struct ResultRepo;

impl ResultRepo {
    /// Store a terminal envelope. A second store for the same job id is
    /// a no-op; returns whether this call performed the write.
    pub async fn store(pool: &PgPool, envelope: &ResultEnvelope) -> Result<bool, sqlx::Error> {
        let job_id: JobId = envelope
            .job_id
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(EnvelopeIdError(format!("{e}")))))?;
        let status = serde_json::to_value(envelope.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "FAIL".to_string());
        let body = serde_json::to_value(envelope)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let result = sqlx::query(
            "INSERT INTO task_results (job_id, status, envelope) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(status)
        .bind(body)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch the terminal envelope for a job id, if one exists.
    pub async fn fetch(pool: &PgPool, job_id: JobId) -> Result<Option<ResultEnvelope>, sqlx::Error> {
        let row = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT envelope FROM task_results WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(value) => {
                let envelope = serde_json::from_value(value)
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }

    /// Fetch only the status string, skipping envelope deserialization.
    pub async fn status(pool: &PgPool, job_id: JobId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT status FROM task_results WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }
}

/// Error for envelopes carrying a non-UUID job id.
#[derive(Debug, thiserror::Error)]
#[error("Envelope job_id is not a UUID: {0}")]
struct EnvelopeIdError(String);
