//! Ephemeral-job adapter.
//!
//! Launches an isolated, single-use execution unit per job. The unit
//! cannot receive arguments directly, so the adapter persists the
//! kwargs in the durable parameter store before launching; the unit
//! fetches them through its callback URL on boot, executes, self-reports
//! its envelope via Completion Delivery, and exits.
//!
//! There is no polling handle distinct from the resource itself: status
//! is inferred from the resource lifecycle, and no envelope exists
//! locally. "Status" answers only whether the unit finished, not what
//! the result was.

pub mod runtime;

use std::sync::Arc;

use simgate_core::envelope::ResultEnvelope;
use simgate_core::registry::ResourceSpec;
use simgate_core::request::JobRequest;
use simgate_core::types::JobId;

use crate::error::BackendError;
use crate::params::ParamStore;
use crate::{FetchOutcome, PollState};

pub use runtime::{
    JobRuntime, LaunchSpec, ProcessRuntime, ProcessRuntimeConfig, ResourcePhase, RuntimeError,
};

/// Adapter for the ephemeral-job backend.
pub struct EphemeralBackend {
    runtime: Arc<dyn JobRuntime>,
    params: Arc<dyn ParamStore>,
}

impl EphemeralBackend {
    pub fn new(runtime: Arc<dyn JobRuntime>, params: Arc<dyn ParamStore>) -> Self {
        Self { runtime, params }
    }

    /// Persist the job's parameters, then launch its unit.
    pub async fn submit(
        &self,
        request: &JobRequest,
        job_name: &str,
        resources: &ResourceSpec,
    ) -> Result<(), BackendError> {
        // Parameters must exist before the unit boots and fetches them.
        self.params.put(request.job_id, &request.kwargs).await?;

        let spec = LaunchSpec {
            name: job_name.to_string(),
            job_id: request.job_id,
            owner: request.owner.clone(),
            application: request.application.clone(),
            action: request.action,
            image: resources.image.clone(),
            cpu: resources.cpu.clone(),
            memory: resources.memory.clone(),
        };

        if let Err(err) = self.runtime.launch(&spec).await {
            // The unit will never boot; the stored parameters are dead.
            if let Err(cleanup) = self.params.remove(request.job_id).await {
                tracing::warn!(job_id = %request.job_id, error = %cleanup, "Parameter cleanup failed");
            }
            return Err(BackendError::Runtime(err.to_string()));
        }

        tracing::info!(
            job_id = %request.job_id,
            job_name,
            "Ephemeral job launched",
        );
        Ok(())
    }

    /// Coarse state inferred from the resource lifecycle. Unknown
    /// resources are `Pending`: absence is not failure.
    pub async fn poll(&self, job_name: &str) -> Result<PollState, BackendError> {
        let phase = self
            .runtime
            .phase(job_name)
            .await
            .map_err(|e| BackendError::Runtime(e.to_string()))?;

        Ok(match phase {
            ResourcePhase::Active | ResourcePhase::NotFound => PollState::Pending,
            ResourcePhase::Succeeded => PollState::Success,
            ResourcePhase::Failed => PollState::Fail,
        })
    }

    /// This backend holds no envelopes. A failed resource yields a
    /// synthesized `WORKER_FAILURE`; a succeeded one already pushed its
    /// result upstream.
    pub async fn fetch(&self, job_id: JobId, job_name: &str) -> Result<FetchOutcome, BackendError> {
        let phase = self
            .runtime
            .phase(job_name)
            .await
            .map_err(|e| BackendError::Runtime(e.to_string()))?;

        Ok(match phase {
            ResourcePhase::Active | ResourcePhase::NotFound => FetchOutcome::NotReady,
            ResourcePhase::Succeeded => FetchOutcome::DeliveredUpstream,
            ResourcePhase::Failed => FetchOutcome::Ready(ResultEnvelope::worker_failure(
                job_id,
                "ephemeral unit was killed or exited abnormally",
            )),
        })
    }

    /// Delete the job resource, killing a running unit.
    pub async fn cancel(&self, job_name: &str) -> Result<bool, BackendError> {
        self.runtime
            .delete(job_name)
            .await
            .map_err(|e| BackendError::Runtime(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FsParamStore;
    use async_trait::async_trait;
    use simgate_core::request::{Action, Kwargs};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Runtime stub with hand-settable phases.
    #[derive(Default)]
    struct FakeRuntime {
        phases: Mutex<HashMap<String, ResourcePhase>>,
        fail_launch: bool,
    }

    impl FakeRuntime {
        fn set_phase(&self, name: &str, phase: ResourcePhase) {
            self.phases.lock().unwrap().insert(name.to_string(), phase);
        }
    }

    #[async_trait]
    impl JobRuntime for FakeRuntime {
        async fn launch(&self, spec: &LaunchSpec) -> Result<(), RuntimeError> {
            if self.fail_launch {
                return Err(RuntimeError::Launch("no capacity".into()));
            }
            self.set_phase(&spec.name, ResourcePhase::Active);
            Ok(())
        }

        async fn phase(&self, name: &str) -> Result<ResourcePhase, RuntimeError> {
            Ok(self
                .phases
                .lock()
                .unwrap()
                .get(name)
                .copied()
                .unwrap_or(ResourcePhase::NotFound))
        }

        async fn delete(&self, name: &str) -> Result<bool, RuntimeError> {
            Ok(self.phases.lock().unwrap().remove(name).is_some())
        }
    }

    fn request() -> JobRequest {
        let mut kwargs = Kwargs::new();
        kwargs.insert("x".into(), serde_json::json!(1));
        JobRequest::new("acme", "demo", Action::Sim, kwargs)
    }

    fn backend_with(runtime: Arc<FakeRuntime>, dir: &std::path::Path) -> EphemeralBackend {
        EphemeralBackend::new(runtime, Arc::new(FsParamStore::new(dir)))
    }

    #[tokio::test]
    async fn submit_persists_params_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let backend = backend_with(Arc::clone(&runtime), dir.path());
        let req = request();

        backend.submit(&req, "acme-demo-j1", &ResourceSpec::default()).await.unwrap();

        // The unit can now fetch its kwargs by job id.
        let store = FsParamStore::new(dir.path());
        let stored = store.get(req.job_id).await.unwrap().unwrap();
        assert_eq!(stored, req.kwargs);
        assert_eq!(
            runtime.phase("acme-demo-j1").await.unwrap(),
            ResourcePhase::Active
        );
    }

    #[tokio::test]
    async fn launch_failure_cleans_up_params() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime {
            fail_launch: true,
            ..Default::default()
        });
        let backend = backend_with(Arc::clone(&runtime), dir.path());
        let req = request();

        let err = backend
            .submit(&req, "acme-demo-j1", &ResourceSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Runtime(_)));

        let store = FsParamStore::new(dir.path());
        assert!(store.get(req.job_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn poll_maps_lifecycle_phases() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let backend = backend_with(Arc::clone(&runtime), dir.path());

        assert_eq!(backend.poll("missing").await.unwrap(), PollState::Pending);

        runtime.set_phase("j", ResourcePhase::Active);
        assert_eq!(backend.poll("j").await.unwrap(), PollState::Pending);

        runtime.set_phase("j", ResourcePhase::Succeeded);
        assert_eq!(backend.poll("j").await.unwrap(), PollState::Success);

        runtime.set_phase("j", ResourcePhase::Failed);
        assert_eq!(backend.poll("j").await.unwrap(), PollState::Fail);
    }

    #[tokio::test]
    async fn fetch_synthesizes_worker_failure_for_killed_units() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let backend = backend_with(Arc::clone(&runtime), dir.path());
        let job_id = simgate_core::types::JobId::new_v4();

        runtime.set_phase("j", ResourcePhase::Failed);
        let outcome = backend.fetch(job_id, "j").await.unwrap();
        match outcome {
            FetchOutcome::Ready(env) => {
                assert_eq!(env.status, simgate_core::envelope::JobStatus::WorkerFailure);
                assert!(env.traceback.is_some());
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_of_succeeded_unit_defers_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let backend = backend_with(Arc::clone(&runtime), dir.path());

        runtime.set_phase("j", ResourcePhase::Succeeded);
        let outcome = backend
            .fetch(simgate_core::types::JobId::new_v4(), "j")
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::DeliveredUpstream));
    }

    #[tokio::test]
    async fn cancel_deletes_the_resource() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let backend = backend_with(Arc::clone(&runtime), dir.path());

        runtime.set_phase("j", ResourcePhase::Active);
        assert!(backend.cancel("j").await.unwrap());
        assert!(!backend.cancel("j").await.unwrap());
    }
}
