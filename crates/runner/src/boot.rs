//! Boot sequence for one ephemeral job.

use std::sync::Arc;

use simgate_core::envelope::ResultEnvelope;
use simgate_core::model::ModelRegistry;
use simgate_core::request::Action;
use simgate_core::types::JobId;
use simgate_core::wrapper;
use simgate_delivery::{
    CompletionDelivery, FsOutputStore, ParamClient, UpstreamConfig, DEFAULT_FETCH_RETRIES,
};

/// Everything a runner learns from its environment.
///
/// Populated by the launching runtime; a missing variable means the
/// launch itself was broken, so construction panics and the resource
/// surfaces as an infrastructure failure.
#[derive(Debug, Clone)]
pub struct BootConfig {
    pub job_id: JobId,
    pub owner: String,
    pub application: String,
    pub action: Action,
    pub callback_url: String,
    pub callback_token: String,
    pub upstream_url: String,
    pub upstream_token: String,
    pub outputs_dir: String,
    /// Parameter fetch retry budget.
    pub fetch_retries: u32,
}

impl BootConfig {
    /// Read the boot environment set by the launching runtime.
    pub fn from_env() -> Self {
        let job_id: JobId = std::env::var("SIMGATE_JOB_ID")
            .expect("SIMGATE_JOB_ID must be set")
            .parse()
            .expect("SIMGATE_JOB_ID must be a UUID");
        let owner = std::env::var("SIMGATE_OWNER").expect("SIMGATE_OWNER must be set");
        let application =
            std::env::var("SIMGATE_APPLICATION").expect("SIMGATE_APPLICATION must be set");
        let action: Action = std::env::var("SIMGATE_ACTION")
            .expect("SIMGATE_ACTION must be set")
            .parse()
            .expect("SIMGATE_ACTION must be a known action");
        let callback_url =
            std::env::var("SIMGATE_CALLBACK_URL").expect("SIMGATE_CALLBACK_URL must be set");
        let callback_token = std::env::var("SIMGATE_CALLBACK_TOKEN").unwrap_or_default();
        let upstream_url =
            std::env::var("SIMGATE_UPSTREAM_URL").expect("SIMGATE_UPSTREAM_URL must be set");
        let upstream_token = std::env::var("SIMGATE_UPSTREAM_TOKEN").unwrap_or_default();
        let outputs_dir =
            std::env::var("SIMGATE_OUTPUTS_DIR").unwrap_or_else(|_| "var/outputs".into());
        let fetch_retries: u32 = std::env::var("SIMGATE_FETCH_RETRIES")
            .unwrap_or_else(|_| DEFAULT_FETCH_RETRIES.to_string())
            .parse()
            .expect("SIMGATE_FETCH_RETRIES must be a valid u32");

        Self {
            job_id,
            owner,
            application,
            action,
            callback_url,
            callback_token,
            upstream_url,
            upstream_token,
            outputs_dir,
            fetch_retries,
        }
    }
}

/// Fetch parameters, execute, and deliver the terminal envelope.
///
/// Every path through this function produces exactly one envelope and
/// one delivery attempt; application failures and fetch exhaustion are
/// data, not process failures.
pub async fn run(config: BootConfig, models: Arc<ModelRegistry>) {
    let fetcher = ParamClient::new(&config.callback_url, &config.callback_token)
        .with_retries(config.fetch_retries);

    let envelope = match fetcher.fetch(config.job_id).await {
        Ok(kwargs) => {
            match models.resolve(&config.owner, &config.application, config.action) {
                Some(model) => wrapper::run_wrapped(config.job_id, &model, kwargs).await,
                None => wrapper::unresolved_model(
                    config.job_id,
                    &config.owner,
                    &config.application,
                    config.action.as_str(),
                ),
            }
        }
        Err(err) => {
            tracing::error!(job_id = %config.job_id, error = %err, "Parameter fetch exhausted retries");
            ResultEnvelope::failure(config.job_id, err.to_string(), 0.0)
        }
    };

    let delivery = CompletionDelivery::new(
        UpstreamConfig {
            base_url: config.upstream_url.clone(),
            token: config.upstream_token.clone(),
        },
        Arc::new(FsOutputStore::new(&config.outputs_dir)),
    );

    // Push failures are logged by the delivery layer; the envelope is
    // this process's only output, so there is nothing left to retry.
    let _ = delivery
        .deliver(
            &config.owner,
            &config.application,
            config.action,
            envelope,
        )
        .await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use simgate_core::request::Kwargs;
    use std::sync::Mutex;

    type Received = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    /// Serve both the parameter callback and the ingestion endpoint.
    async fn start_collaborators(inputs: Option<Kwargs>) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let received_state = Arc::clone(&received);

        let app = Router::new()
            .route(
                "/callback/inputs/{job_id}",
                get(move |axum::extract::Path(_job_id): axum::extract::Path<String>| {
                    let inputs = inputs.clone();
                    async move {
                        match inputs {
                            Some(kwargs) => (
                                axum::http::StatusCode::OK,
                                Json(serde_json::json!({ "inputs": kwargs })),
                            ),
                            None => (
                                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                                Json(serde_json::json!({ "error": "store down" })),
                            ),
                        }
                    }
                }),
            )
            .route(
                "/{owner}/{application}/{kind}/{job_id}",
                put(
                    |State(received): State<Received>,
                     axum::extract::Path(path): axum::extract::Path<(
                        String,
                        String,
                        String,
                        String,
                    )>,
                     Json(body): Json<serde_json::Value>| async move {
                        let route = format!("{}/{}/{}/{}", path.0, path.1, path.2, path.3);
                        received.lock().unwrap().push((route, body));
                        axum::http::StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(received_state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), received)
    }

    fn config(base: &str, outputs_dir: &str) -> BootConfig {
        BootConfig {
            job_id: JobId::new_v4(),
            owner: "acme".into(),
            application: "demo".into(),
            action: Action::Sim,
            callback_url: format!("{base}/callback/inputs"),
            callback_token: "callback-token".into(),
            upstream_url: base.to_string(),
            upstream_token: "push-token".into(),
            outputs_dir: outputs_dir.to_string(),
            fetch_retries: 0,
        }
    }

    fn sim_models() -> Arc<ModelRegistry> {
        let mut models = ModelRegistry::new();
        models.register("acme", "demo", Action::Sim, |kwargs| async move {
            let x = kwargs
                .get("x")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| anyhow::anyhow!("missing x"))?;
            Ok(serde_json::json!({"y": x * 10}))
        });
        Arc::new(models)
    }

    #[tokio::test]
    async fn boot_fetches_executes_and_delivers() {
        let mut inputs = Kwargs::new();
        inputs.insert("x".into(), serde_json::json!(4));
        let (base, received) = start_collaborators(Some(inputs)).await;
        let outputs_dir = tempfile::tempdir().unwrap();

        let cfg = config(&base, &outputs_dir.path().display().to_string());
        let job_id = cfg.job_id;
        run(cfg, sim_models()).await;

        let received = received.lock().unwrap();
        let (route, body) = &received[0];
        assert_eq!(route, &format!("acme/demo/outputs/{job_id}"));
        assert_eq!(body["status"], "SUCCESS");
        // sim outputs were persisted and replaced by the descriptor.
        assert_eq!(body["outputs"]["kind"], "file");
    }

    #[tokio::test]
    async fn fetch_exhaustion_delivers_fail_envelope() {
        let (base, received) = start_collaborators(None).await;
        let outputs_dir = tempfile::tempdir().unwrap();

        let cfg = config(&base, &outputs_dir.path().display().to_string());
        let job_id = cfg.job_id;
        run(cfg, sim_models()).await;

        let received = received.lock().unwrap();
        let (route, body) = &received[0];
        assert_eq!(route, &format!("acme/demo/outputs/{job_id}"));
        assert_eq!(body["status"], "FAIL");
        assert!(body["traceback"]
            .as_str()
            .unwrap()
            .contains("Parameter fetch failed"));
        assert!(body.get("outputs").is_none());
    }

    #[tokio::test]
    async fn unregistered_model_delivers_fail_envelope() {
        let (base, received) = start_collaborators(Some(Kwargs::new())).await;
        let outputs_dir = tempfile::tempdir().unwrap();

        let cfg = config(&base, &outputs_dir.path().display().to_string());
        run(cfg, Arc::new(ModelRegistry::new())).await;

        let received = received.lock().unwrap();
        let (_, body) = &received[0];
        assert_eq!(body["status"], "FAIL");
        assert!(body["traceback"]
            .as_str()
            .unwrap()
            .contains("No model registered"));
    }
}
