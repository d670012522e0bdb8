//! Storage collaborator seam for large simulation outputs.
//!
//! The gateway never interprets persisted outputs; it hands them to an
//! [`OutputStore`] and carries the returned [`StorageRef`] in the
//! envelope instead of the raw payload.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use simgate_core::types::JobId;

/// Reference to durably persisted outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRef {
    /// Store kind, e.g. `"file"`.
    pub kind: String,
    /// Store-native location of the payload.
    pub location: String,
    /// Serialized payload size.
    pub bytes: u64,
}

impl StorageRef {
    /// JSON descriptor placed into the envelope's `outputs` field.
    pub fn descriptor(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind,
            "location": self.location,
            "bytes": self.bytes,
        })
    }
}

/// Errors from the storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable persistence for raw simulation outputs.
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Persist the outputs for a job and return a reference to them.
    async fn persist(
        &self,
        job_id: JobId,
        outputs: &serde_json::Value,
    ) -> Result<StorageRef, StorageError>;
}

/// Filesystem-backed output store: one JSON file per job id.
pub struct FsOutputStore {
    root: PathBuf,
}

impl FsOutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl OutputStore for FsOutputStore {
    async fn persist(
        &self,
        job_id: JobId,
        outputs: &serde_json::Value,
    ) -> Result<StorageRef, StorageError> {
        let body = serde_json::to_vec(outputs)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(format!("{job_id}.json"));
        tokio::fs::write(&path, &body).await?;

        tracing::debug!(job_id = %job_id, path = %path.display(), bytes = body.len(), "Outputs persisted");

        Ok(StorageRef {
            kind: "file".to_string(),
            location: path.display().to_string(),
            bytes: body.len() as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_writes_file_and_returns_ref() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsOutputStore::new(dir.path());
        let job_id = JobId::new_v4();

        let outputs = serde_json::json!({"depth_grid": [0.1, 0.2]});
        let storage_ref = store.persist(job_id, &outputs).await.unwrap();

        assert_eq!(storage_ref.kind, "file");
        assert!(storage_ref.bytes > 0);

        let written = std::fs::read_to_string(&storage_ref.location).unwrap();
        let back: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(back, outputs);
    }

    #[test]
    fn descriptor_has_expected_keys() {
        let storage_ref = StorageRef {
            kind: "file".into(),
            location: "/data/abc.json".into(),
            bytes: 17,
        };
        let descriptor = storage_ref.descriptor();
        assert_eq!(descriptor["kind"], "file");
        assert_eq!(descriptor["bytes"], 17);
    }
}
