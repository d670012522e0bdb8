//! The uniform result record every backend produces.
//!
//! [`ResultEnvelope`] is the single canonical shape a job terminates
//! with, regardless of whether it ran on the queue worker pool, the
//! cluster, or an ephemeral unit.  The constructors enforce the shape
//! invariants: `SUCCESS` carries outputs and no traceback, `FAIL` and
//! `WORKER_FAILURE` carry a traceback and no outputs, and
//! `meta.task_times` is never empty.

use serde::{Deserialize, Serialize};

use crate::types::JobId;

/// Protocol/model version tag stamped into every envelope.
pub const PROTOCOL_VERSION: &str = "v1";

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// The target callable returned a value.
    #[serde(rename = "SUCCESS")]
    Success,

    /// The target callable raised; the wrapper captured the error.
    #[serde(rename = "FAIL")]
    Fail,

    /// The backend infrastructure failed (timeout, killed worker,
    /// dead container) before the wrapper could produce an envelope.
    /// Set by adapters, never by the wrapper itself.
    #[serde(rename = "WORKER_FAILURE")]
    WorkerFailure,
}

impl JobStatus {
    /// `true` for `SUCCESS`.
    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Success)
    }
}

/// Envelope metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// Elapsed wall-clock seconds, one entry per wrapper layer, ordered
    /// innermost to outermost. Always non-empty.
    pub task_times: Vec<f64>,
}

/// The canonical result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub job_id: String,

    pub status: JobStatus,

    /// Present exactly when `status` is `SUCCESS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<serde_json::Value>,

    pub meta: EnvelopeMeta,

    /// Present exactly when `status` is `FAIL` or `WORKER_FAILURE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,

    pub version: String,
}

impl ResultEnvelope {
    /// Build a `SUCCESS` envelope from the callable's return value.
    pub fn success(job_id: JobId, outputs: serde_json::Value, elapsed_secs: f64) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Success,
            outputs: Some(outputs),
            meta: EnvelopeMeta {
                task_times: vec![elapsed_secs],
            },
            traceback: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Build a `FAIL` envelope from a captured application error.
    pub fn failure(job_id: JobId, traceback: impl Into<String>, elapsed_secs: f64) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Fail,
            outputs: None,
            meta: EnvelopeMeta {
                task_times: vec![elapsed_secs],
            },
            traceback: Some(traceback.into()),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Build a `WORKER_FAILURE` envelope for an infrastructure failure
    /// observed by an adapter with no wrapper-produced envelope available.
    ///
    /// The wrapper never measured anything, so the single task-time entry
    /// is zero; `meta.task_times` must still be non-empty.
    pub fn worker_failure(job_id: JobId, traceback: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::WorkerFailure,
            outputs: None,
            meta: EnvelopeMeta {
                task_times: vec![0.0],
            },
            traceback: Some(traceback.into()),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Append an outer wrapper layer's elapsed time.
    ///
    /// Layers append in execution-nesting order, so the sequence reads
    /// innermost to outermost.
    pub fn push_task_time(&mut self, elapsed_secs: f64) {
        self.meta.task_times.push(elapsed_secs);
    }

    /// Replace the outputs with a storage descriptor after the raw
    /// outputs were persisted by the storage collaborator.
    pub fn replace_outputs(&mut self, descriptor: serde_json::Value) {
        self.outputs = Some(descriptor);
    }

    /// Downgrade a `SUCCESS` envelope to `FAIL` (e.g. when the storage
    /// write for its outputs failed and the result is unreferencable).
    pub fn downgrade_to_failure(&mut self, traceback: impl Into<String>) {
        self.status = JobStatus::Fail;
        self.outputs = None;
        self.traceback = Some(traceback.into());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id() -> JobId {
        JobId::new_v4()
    }

    #[test]
    fn success_has_outputs_and_no_traceback() {
        let env = ResultEnvelope::success(job_id(), serde_json::json!({"y": 2}), 0.5);
        assert_eq!(env.status, JobStatus::Success);
        assert!(env.outputs.is_some());
        assert!(env.traceback.is_none());
        assert_eq!(env.version, PROTOCOL_VERSION);
    }

    #[test]
    fn failure_has_traceback_and_no_outputs() {
        let env = ResultEnvelope::failure(job_id(), "boom", 0.1);
        assert_eq!(env.status, JobStatus::Fail);
        assert!(env.outputs.is_none());
        assert_eq!(env.traceback.as_deref(), Some("boom"));
    }

    #[test]
    fn worker_failure_has_non_empty_task_times() {
        let env = ResultEnvelope::worker_failure(job_id(), "soft time limit exceeded");
        assert_eq!(env.status, JobStatus::WorkerFailure);
        assert!(env.outputs.is_none());
        assert!(env.traceback.is_some());
        assert!(!env.meta.task_times.is_empty());
    }

    #[test]
    fn success_serialization_omits_traceback_key() {
        let env = ResultEnvelope::success(job_id(), serde_json::json!({"y": 2}), 0.5);
        let value = serde_json::to_value(&env).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("outputs"));
        assert!(!obj.contains_key("traceback"));
        assert_eq!(obj["status"], "SUCCESS");
    }

    #[test]
    fn failure_serialization_omits_outputs_key() {
        let env = ResultEnvelope::failure(job_id(), "division error", 0.2);
        let value = serde_json::to_value(&env).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("outputs"));
        assert!(obj.contains_key("traceback"));
        assert_eq!(obj["status"], "FAIL");
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let env = ResultEnvelope::success(job_id(), serde_json::json!([1, 2, 3]), 1.25);
        let text = serde_json::to_string(&env).unwrap();
        let back: ResultEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back.status, JobStatus::Success);
        assert_eq!(back.job_id, env.job_id);
        assert_eq!(back.meta.task_times, vec![1.25]);
    }

    #[test]
    fn task_times_append_innermost_to_outermost() {
        let mut env = ResultEnvelope::success(job_id(), serde_json::json!({}), 1.0);
        env.push_task_time(2.0);
        env.push_task_time(3.0);
        assert_eq!(env.meta.task_times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn downgrade_clears_outputs() {
        let mut env = ResultEnvelope::success(job_id(), serde_json::json!({"big": true}), 0.9);
        env.downgrade_to_failure("storage write failed");
        assert_eq!(env.status, JobStatus::Fail);
        assert!(env.outputs.is_none());
        assert!(env.traceback.as_deref().unwrap().contains("storage"));
    }
}
