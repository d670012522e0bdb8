//! Cluster scheduler clients.
//!
//! [`SchedulerClient`] is the seam between the cluster adapter and
//! whatever actually places work on remote workers. [`HttpScheduler`]
//! talks to a remote scheduler's REST API; [`LocalScheduler`] executes
//! submissions in-process and backs development and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use simgate_core::envelope::ResultEnvelope;
use simgate_core::model::ModelRegistry;
use simgate_core::request::{Action, Kwargs};
use simgate_core::types::JobId;
use simgate_core::wrapper;

/// Submission payload for a cluster future.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterJobSpec {
    pub job_id: JobId,
    pub owner: String,
    pub application: String,
    pub action: Action,
    pub kwargs: Kwargs,
    /// Cluster-enforced execution timeout, seconds.
    pub timeout_secs: Option<u64>,
}

/// Scheduler-native state of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FutureState {
    /// Queued or executing.
    Pending,
    /// The future completed and holds an envelope (which may itself
    /// record an application failure).
    Finished,
    /// The future died without producing an envelope: infrastructure
    /// failure.
    Errored,
    /// The scheduler does not know this key.
    Unknown,
}

/// Errors from the scheduler seam.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Scheduler API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Placement and inspection of cluster futures.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Submit a job under a caller-supplied deterministic key.
    async fn submit(&self, key: &str, spec: &ClusterJobSpec) -> Result<(), SchedulerError>;

    /// Current state of the future registered under `key`.
    async fn state(&self, key: &str) -> Result<FutureState, SchedulerError>;

    /// The envelope held by a finished future, if any.
    async fn fetch(&self, key: &str) -> Result<Option<ResultEnvelope>, SchedulerError>;
}

// ---------------------------------------------------------------------------
// HttpScheduler
// ---------------------------------------------------------------------------

/// HTTP timeout for scheduler API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST client for a remote cluster scheduler.
pub struct HttpScheduler {
    client: reqwest::Client,
    base_url: String,
}

/// Body shape of `GET /futures/{key}/state`.
#[derive(Debug, Deserialize)]
struct StateResponse {
    state: FutureState,
}

impl HttpScheduler {
    /// * `base_url` - scheduler base URL, e.g. `http://scheduler:8786`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, SchedulerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SchedulerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SchedulerClient for HttpScheduler {
    async fn submit(&self, key: &str, spec: &ClusterJobSpec) -> Result<(), SchedulerError> {
        let response = self
            .client
            .post(format!("{}/futures/{key}", self.base_url))
            .json(spec)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn state(&self, key: &str) -> Result<FutureState, SchedulerError> {
        let response = self
            .client
            .get(format!("{}/futures/{key}/state", self.base_url))
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(FutureState::Unknown);
        }
        let response = Self::ensure_success(response).await?;
        let body: StateResponse = response.json().await?;
        Ok(body.state)
    }

    async fn fetch(&self, key: &str) -> Result<Option<ResultEnvelope>, SchedulerError> {
        let response = self
            .client
            .get(format!("{}/futures/{key}/result", self.base_url))
            .send()
            .await?;

        match response.status().as_u16() {
            404 | 202 => Ok(None),
            _ => {
                let response = Self::ensure_success(response).await?;
                Ok(Some(response.json().await?))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LocalScheduler
// ---------------------------------------------------------------------------

/// Bookkeeping for one in-process future.
struct FutureSlot {
    state: FutureState,
    envelope: Option<ResultEnvelope>,
}

/// In-process scheduler: executes submissions on spawned tasks.
///
/// Used when no remote scheduler is configured, and by tests. The
/// execution path is the same wrapper the remote workers run, so the
/// envelopes are indistinguishable.
pub struct LocalScheduler {
    models: Arc<ModelRegistry>,
    futures: Arc<RwLock<HashMap<String, FutureSlot>>>,
}

impl LocalScheduler {
    pub fn new(models: Arc<ModelRegistry>) -> Self {
        Self {
            models,
            futures: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SchedulerClient for LocalScheduler {
    async fn submit(&self, key: &str, spec: &ClusterJobSpec) -> Result<(), SchedulerError> {
        {
            let mut futures = self.futures.write().await;
            if futures.contains_key(key) {
                return Err(SchedulerError::Api {
                    status: 409,
                    body: format!("future {key} already exists"),
                });
            }
            futures.insert(
                key.to_string(),
                FutureSlot {
                    state: FutureState::Pending,
                    envelope: None,
                },
            );
        }

        let futures = Arc::clone(&self.futures);
        let models = Arc::clone(&self.models);
        let key = key.to_string();
        let spec = spec.clone();

        tokio::spawn(async move {
            let timeout = spec.timeout_secs.map(Duration::from_secs);
            let job_id = spec.job_id;
            let run = async move {
                match models.resolve(&spec.owner, &spec.application, spec.action) {
                    Some(model) => wrapper::run_wrapped(job_id, &model, spec.kwargs).await,
                    None => wrapper::unresolved_model(
                        job_id,
                        &spec.owner,
                        &spec.application,
                        spec.action.as_str(),
                    ),
                }
            };

            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, run).await.ok(),
                None => Some(run.await),
            };

            let mut futures = futures.write().await;
            let Some(slot) = futures.get_mut(&key) else {
                return;
            };
            match outcome {
                Some(envelope) => {
                    slot.state = FutureState::Finished;
                    slot.envelope = Some(envelope);
                }
                None => {
                    // Timed out: the future died with no envelope.
                    tracing::warn!(key = %key, "Cluster execution exceeded its timeout");
                    slot.state = FutureState::Errored;
                }
            }
        });

        Ok(())
    }

    async fn state(&self, key: &str) -> Result<FutureState, SchedulerError> {
        Ok(self
            .futures
            .read()
            .await
            .get(key)
            .map(|slot| slot.state)
            .unwrap_or(FutureState::Unknown))
    }

    async fn fetch(&self, key: &str) -> Result<Option<ResultEnvelope>, SchedulerError> {
        Ok(self
            .futures
            .read()
            .await
            .get(key)
            .and_then(|slot| slot.envelope.clone()))
    }
}
