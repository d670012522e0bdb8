//! Durable key-value hand-off of job parameters to ephemeral units.
//!
//! The ephemeral unit cannot receive arguments directly; the adapter
//! persists the kwargs under the job id before launching, and the unit
//! fetches them through its callback URL on boot. Keys are written once
//! at submission and read once (with retries) at boot, so atomic
//! set/get is the whole locking discipline.

use std::path::PathBuf;

use async_trait::async_trait;

use simgate_core::request::Kwargs;
use simgate_core::types::JobId;

/// Errors from the parameter store.
#[derive(Debug, thiserror::Error)]
pub enum ParamStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The key already exists; parameters are write-once.
    #[error("Parameters already stored for job {0}")]
    AlreadyStored(JobId),
}

/// Write-once key-value store of job parameters.
#[async_trait]
pub trait ParamStore: Send + Sync {
    async fn put(&self, job_id: JobId, kwargs: &Kwargs) -> Result<(), ParamStoreError>;
    async fn get(&self, job_id: JobId) -> Result<Option<Kwargs>, ParamStoreError>;
    async fn remove(&self, job_id: JobId) -> Result<(), ParamStoreError>;
}

/// Filesystem-backed parameter store: one JSON file per job id.
pub struct FsParamStore {
    root: PathBuf,
}

impl FsParamStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, job_id: JobId) -> PathBuf {
        self.root.join(format!("{job_id}.json"))
    }
}

#[async_trait]
impl ParamStore for FsParamStore {
    async fn put(&self, job_id: JobId, kwargs: &Kwargs) -> Result<(), ParamStoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(job_id);
        if tokio::fs::try_exists(&path).await? {
            return Err(ParamStoreError::AlreadyStored(job_id));
        }
        let body = serde_json::to_vec(&serde_json::Value::Object(kwargs.clone()))?;
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Kwargs>, ParamStoreError> {
        let path = self.path_for(job_id);
        match tokio::fs::read(&path).await {
            Ok(body) => {
                let value: serde_json::Value = serde_json::from_slice(&body)?;
                match value {
                    serde_json::Value::Object(map) => Ok(Some(map)),
                    _ => Ok(None),
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, job_id: JobId) -> Result<(), ParamStoreError> {
        match tokio::fs::remove_file(self.path_for(job_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
