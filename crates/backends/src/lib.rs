//! Backend adapters for the three execution substrates.
//!
//! Every adapter exposes the same three operations (submit, poll,
//! fetch) so the rest of the system is backend-agnostic. The set of
//! backends is closed: [`Backends`] dispatches with an exhaustive match
//! over [`BackendKind`], and adding a backend means adding a variant and
//! one adapter, never touching call sites.

pub mod cluster;
pub mod ephemeral;
pub mod error;
pub mod params;
pub mod queue;

use simgate_core::envelope::ResultEnvelope;
use simgate_core::registry::BackendKind;
use simgate_core::request::JobRequest;
use simgate_core::router::{ephemeral_job_name, RouteTarget};
use simgate_core::types::JobId;

pub use cluster::ClusterBackend;
pub use ephemeral::EphemeralBackend;
pub use error::BackendError;
pub use params::{FsParamStore, ParamStore, ParamStoreError};
pub use queue::QueueBackend;

/// Coarse execution state reported by `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Still executing, or the job id is unknown to this backend.
    Pending,
    /// Terminal success.
    Success,
    /// Terminal failure, including infrastructure failures.
    Fail,
}

/// Result of `fetch`.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The terminal envelope.
    Ready(ResultEnvelope),
    /// Not terminal yet (HTTP 202 semantics at the API layer).
    NotReady,
    /// Terminal, but the envelope was self-reported upstream and is not
    /// held by this system (ephemeral units).
    DeliveredUpstream,
}

/// Acknowledgement returned by an asynchronous submission.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    /// Pending tasks on the target queue; absent for non-queue backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<i64>,
}

/// All three adapters behind one dispatch point.
#[derive(Clone)]
pub struct Backends {
    pub queue: QueueBackend,
    pub cluster: std::sync::Arc<ClusterBackend>,
    pub ephemeral: std::sync::Arc<EphemeralBackend>,
}

impl Backends {
    /// Submit a request to the backend its route resolved to.
    pub async fn submit(
        &self,
        request: &JobRequest,
        target: &RouteTarget,
    ) -> Result<SubmitReceipt, BackendError> {
        match target {
            RouteTarget::Queue {
                queue_name,
                task_name,
            } => self.queue.submit(request, queue_name, task_name).await,
            RouteTarget::Cluster {
                future_key,
                timeout_secs,
            } => {
                self.cluster
                    .submit(request, future_key, *timeout_secs)
                    .await?;
                Ok(SubmitReceipt {
                    job_id: request.job_id,
                    queue_length: None,
                })
            }
            RouteTarget::Ephemeral {
                job_name,
                resources,
            } => {
                self.ephemeral.submit(request, job_name, resources).await?;
                Ok(SubmitReceipt {
                    job_id: request.job_id,
                    queue_length: None,
                })
            }
        }
    }

    /// Poll a job's coarse state on the backend a project is configured
    /// for.
    pub async fn poll(
        &self,
        kind: BackendKind,
        owner: &str,
        application: &str,
        job_id: JobId,
    ) -> Result<PollState, BackendError> {
        match kind {
            BackendKind::Queue => self.queue.poll(job_id).await,
            BackendKind::Cluster => self.cluster.poll(job_id).await,
            BackendKind::Ephemeral => {
                self.ephemeral
                    .poll(&ephemeral_job_name(owner, application, job_id))
                    .await
            }
        }
    }

    /// Fetch a job's terminal envelope, if this backend holds one.
    pub async fn fetch(
        &self,
        kind: BackendKind,
        owner: &str,
        application: &str,
        job_id: JobId,
    ) -> Result<FetchOutcome, BackendError> {
        match kind {
            BackendKind::Queue => self.queue.fetch(job_id).await,
            BackendKind::Cluster => self.cluster.fetch(job_id).await,
            BackendKind::Ephemeral => {
                self.ephemeral
                    .fetch(job_id, &ephemeral_job_name(owner, application, job_id))
                    .await
            }
        }
    }

    /// Cancel a job where the backend supports it.
    ///
    /// Returns whether anything was cancelled. The cluster backend has
    /// no cancellation primitive: once submitted, a cluster job runs to
    /// completion or failure.
    pub async fn cancel(
        &self,
        kind: BackendKind,
        owner: &str,
        application: &str,
        job_id: JobId,
    ) -> Result<bool, BackendError> {
        match kind {
            BackendKind::Queue => self.queue.cancel(job_id).await,
            BackendKind::Cluster => Err(BackendError::CancelUnsupported),
            BackendKind::Ephemeral => {
                self.ephemeral
                    .cancel(&ephemeral_job_name(owner, application, job_id))
                    .await
            }
        }
    }
}
