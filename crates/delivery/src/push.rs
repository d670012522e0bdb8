//! Completion delivery: push a terminal envelope to the upstream
//! consumer.
//!
//! Two ordered side effects, always attempted even when the computation
//! failed: persist successful `sim` outputs through the storage
//! collaborator (replacing `outputs` with a storage descriptor), then
//! PUT the envelope to the upstream ingestion path selected by action.
//!
//! The push is single-attempt. The job's state has already terminated,
//! so a failed push degrades to a logged warning. The computed result
//! is not discarded because one delivery attempt failed.

use std::sync::Arc;
use std::time::Duration;

use simgate_core::envelope::ResultEnvelope;
use simgate_core::request::Action;
use simgate_core::types::JobId;

use crate::storage::OutputStore;

/// HTTP timeout for the single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream ingestion endpoint configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream consumer, no trailing slash.
    pub base_url: String,
    /// Bearer token for the ingestion endpoints.
    pub token: String,
}

/// Errors from a delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {0}")]
    HttpStatus(u16),
}

/// Pushes finished envelopes upstream.
pub struct CompletionDelivery {
    client: reqwest::Client,
    config: UpstreamConfig,
    store: Arc<dyn OutputStore>,
}

impl CompletionDelivery {
    pub fn new(config: UpstreamConfig, store: Arc<dyn OutputStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            config,
            store,
        }
    }

    /// Deliver a terminal envelope upstream.
    ///
    /// Storage-write failures downgrade the envelope to `FAIL` (a
    /// `SUCCESS` envelope whose outputs were never persisted would be
    /// unreferencable) and the push still happens. Push failures are
    /// logged and returned; they never alter the job's terminal status.
    pub async fn deliver(
        &self,
        owner: &str,
        application: &str,
        action: Action,
        mut envelope: ResultEnvelope,
    ) -> Result<(), DeliveryError> {
        if action == Action::Sim && envelope.status.is_success() {
            self.persist_outputs(&mut envelope).await;
        }

        let path = match action {
            Action::Sim => "outputs",
            Action::InputsGet | Action::InputsParse => "inputs",
        };
        let url = format!(
            "{}/{owner}/{application}/{path}/{}",
            self.config.base_url.trim_end_matches('/'),
            envelope.job_id,
        );

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.token)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(job_id = %envelope.job_id, url = %url, error = %err, "Completion push failed");
                DeliveryError::Request(err)
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(job_id = %envelope.job_id, url = %url, status, "Completion push rejected upstream");
            return Err(DeliveryError::HttpStatus(status));
        }

        tracing::info!(job_id = %envelope.job_id, url = %url, "Envelope delivered upstream");
        Ok(())
    }

    /// Persist raw outputs and swap in the storage descriptor, or
    /// downgrade the envelope when the write fails.
    async fn persist_outputs(&self, envelope: &mut ResultEnvelope) {
        let Some(outputs) = envelope.outputs.clone() else {
            return;
        };
        let Ok(job_id) = envelope.job_id.parse::<JobId>() else {
            envelope.downgrade_to_failure(format!(
                "Envelope job_id is not a UUID: {}",
                envelope.job_id
            ));
            return;
        };

        match self.store.persist(job_id, &outputs).await {
            Ok(storage_ref) => envelope.replace_outputs(storage_ref.descriptor()),
            Err(err) => {
                tracing::warn!(job_id = %envelope.job_id, error = %err, "Output storage write failed");
                envelope.downgrade_to_failure(format!("Output storage write failed: {err}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::put;
    use axum::{Json, Router};
    use std::sync::Mutex;

    use crate::storage::{FsOutputStore, StorageError, StorageRef};

    /// Start an in-process upstream that records every PUT it receives.
    async fn start_upstream() -> (String, Arc<Mutex<Vec<(String, String, serde_json::Value)>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route(
                "/{owner}/{application}/{kind}/{job_id}",
                put(
                    |State(received): State<Arc<Mutex<Vec<(String, String, serde_json::Value)>>>>,
                     axum::extract::Path(path): axum::extract::Path<(
                        String,
                        String,
                        String,
                        String,
                    )>,
                     headers: HeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        let route = format!("{}/{}/{}/{}", path.0, path.1, path.2, path.3);
                        received.lock().unwrap().push((route, auth, body));
                        axum::http::StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(Arc::clone(&received));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), received)
    }

    fn delivery_to(base_url: &str, store: Arc<dyn OutputStore>) -> CompletionDelivery {
        CompletionDelivery::new(
            UpstreamConfig {
                base_url: base_url.to_string(),
                token: "push-token".to_string(),
            },
            store,
        )
    }

    #[tokio::test]
    async fn sim_success_is_stored_then_pushed_with_descriptor() {
        let (base_url, received) = start_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let delivery = delivery_to(&base_url, Arc::new(FsOutputStore::new(dir.path())));

        let job_id = JobId::new_v4();
        let envelope =
            ResultEnvelope::success(job_id, serde_json::json!({"depth": [1.0, 2.0]}), 3.2);
        delivery
            .deliver("acme", "demo", Action::Sim, envelope)
            .await
            .unwrap();

        let received = received.lock().unwrap();
        let (route, auth, body) = &received[0];
        assert_eq!(route, &format!("acme/demo/outputs/{job_id}"));
        assert_eq!(auth, "Bearer push-token");
        assert_eq!(body["status"], "SUCCESS");
        // Raw outputs were replaced by the storage descriptor.
        assert_eq!(body["outputs"]["kind"], "file");
        assert!(body["outputs"]["location"].as_str().unwrap().contains(&job_id.to_string()));
    }

    #[tokio::test]
    async fn failed_envelope_is_still_pushed() {
        let (base_url, received) = start_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let delivery = delivery_to(&base_url, Arc::new(FsOutputStore::new(dir.path())));

        let job_id = JobId::new_v4();
        let envelope = ResultEnvelope::failure(job_id, "model blew up", 0.4);
        delivery
            .deliver("acme", "demo", Action::Sim, envelope)
            .await
            .unwrap();

        let received = received.lock().unwrap();
        let (route, _, body) = &received[0];
        assert_eq!(route, &format!("acme/demo/outputs/{job_id}"));
        assert_eq!(body["status"], "FAIL");
        assert!(body.get("outputs").is_none());
    }

    #[tokio::test]
    async fn inputs_parse_goes_to_inputs_path_without_storage() {
        let (base_url, received) = start_upstream().await;
        let dir = tempfile::tempdir().unwrap();
        let delivery = delivery_to(&base_url, Arc::new(FsOutputStore::new(dir.path())));

        let job_id = JobId::new_v4();
        let envelope = ResultEnvelope::success(job_id, serde_json::json!({"valid": true}), 0.1);
        delivery
            .deliver("acme", "demo", Action::InputsParse, envelope)
            .await
            .unwrap();

        let received = received.lock().unwrap();
        let (route, _, body) = &received[0];
        assert_eq!(route, &format!("acme/demo/inputs/{job_id}"));
        // Inputs results are small; raw outputs ride along unreplaced.
        assert_eq!(body["outputs"], serde_json::json!({"valid": true}));
    }

    struct BrokenStore;

    #[async_trait]
    impl OutputStore for BrokenStore {
        async fn persist(
            &self,
            _job_id: JobId,
            _outputs: &serde_json::Value,
        ) -> Result<StorageRef, StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test]
    async fn storage_failure_downgrades_envelope_and_still_pushes() {
        let (base_url, received) = start_upstream().await;
        let delivery = delivery_to(&base_url, Arc::new(BrokenStore));

        let job_id = JobId::new_v4();
        let envelope = ResultEnvelope::success(job_id, serde_json::json!({"huge": true}), 9.0);
        delivery
            .deliver("acme", "demo", Action::Sim, envelope)
            .await
            .unwrap();

        let received = received.lock().unwrap();
        let (_, _, body) = &received[0];
        assert_eq!(body["status"], "FAIL");
        assert!(body.get("outputs").is_none());
        assert!(body["traceback"].as_str().unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = delivery_to(
            "http://127.0.0.1:9",
            Arc::new(FsOutputStore::new(dir.path())),
        );

        let envelope = ResultEnvelope::failure(JobId::new_v4(), "boom", 0.1);
        let err = delivery
            .deliver("acme", "demo", Action::Sim, envelope)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Request(_)));
    }
}
