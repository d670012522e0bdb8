//! Ephemeral execution runtimes.
//!
//! [`JobRuntime`] is the seam between the ephemeral adapter and the
//! substrate that actually runs one-shot units. [`ProcessRuntime`]
//! spawns one local runner process per job; a container-orchestrator
//! implementation plugs in behind the same trait.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use simgate_core::request::Action;
use simgate_core::types::JobId;

/// Lifecycle phase of a job resource, as reported by the substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePhase {
    /// Launched and not yet exited.
    Active,
    /// Exited cleanly. The unit self-reported its envelope upstream
    /// before exiting, even for application failures.
    Succeeded,
    /// Killed or exited abnormally: infrastructure failure.
    Failed,
    /// No resource by that name.
    NotFound,
}

/// Errors from the ephemeral runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Launch failed: {0}")]
    Launch(String),
}

/// Everything the runtime needs to start one unit.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// DNS-safe resource name, unique per job.
    pub name: String,
    pub job_id: JobId,
    pub owner: String,
    pub application: String,
    pub action: Action,
    /// Container image, where the substrate uses one.
    pub image: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

/// One-shot execution substrate.
#[async_trait]
pub trait JobRuntime: Send + Sync {
    /// Launch a unit. The unit receives only identifiers and endpoint
    /// configuration; it fetches its kwargs itself on boot.
    async fn launch(&self, spec: &LaunchSpec) -> Result<(), RuntimeError>;

    /// Lifecycle phase of the named resource.
    async fn phase(&self, name: &str) -> Result<ResourcePhase, RuntimeError>;

    /// Delete the named resource, killing it if still running.
    /// Returns whether a resource existed.
    async fn delete(&self, name: &str) -> Result<bool, RuntimeError>;
}

// ---------------------------------------------------------------------------
// ProcessRuntime
// ---------------------------------------------------------------------------

/// Endpoint configuration handed to every spawned runner.
#[derive(Debug, Clone)]
pub struct ProcessRuntimeConfig {
    /// Path to the runner binary.
    pub runner_bin: PathBuf,
    /// Parameter callback base URL the unit fetches its kwargs from.
    pub callback_url: String,
    /// Bearer token for the callback URL.
    pub callback_token: String,
    /// Upstream ingestion base URL for completion delivery.
    pub upstream_base_url: String,
    /// Bearer token for the upstream ingestion endpoints.
    pub upstream_token: String,
    /// Directory the runner's output store writes to.
    pub outputs_dir: PathBuf,
}

/// Process-per-job runtime: each launch spawns one runner process.
pub struct ProcessRuntime {
    config: ProcessRuntimeConfig,
    children: Mutex<HashMap<String, Child>>,
}

impl ProcessRuntime {
    pub fn new(config: ProcessRuntimeConfig) -> Self {
        Self {
            config,
            children: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl JobRuntime for ProcessRuntime {
    async fn launch(&self, spec: &LaunchSpec) -> Result<(), RuntimeError> {
        let mut children = self.children.lock().await;
        if children.contains_key(&spec.name) {
            return Err(RuntimeError::Launch(format!(
                "resource {} already exists",
                spec.name
            )));
        }

        let child = Command::new(&self.config.runner_bin)
            .env("SIMGATE_JOB_ID", spec.job_id.to_string())
            .env("SIMGATE_OWNER", &spec.owner)
            .env("SIMGATE_APPLICATION", &spec.application)
            .env("SIMGATE_ACTION", spec.action.as_str())
            .env("SIMGATE_CALLBACK_URL", &self.config.callback_url)
            .env("SIMGATE_CALLBACK_TOKEN", &self.config.callback_token)
            .env("SIMGATE_UPSTREAM_URL", &self.config.upstream_base_url)
            .env("SIMGATE_UPSTREAM_TOKEN", &self.config.upstream_token)
            .env("SIMGATE_OUTPUTS_DIR", &self.config.outputs_dir)
            .kill_on_drop(true)
            .spawn()?;

        tracing::info!(
            name = %spec.name,
            job_id = %spec.job_id,
            "Runner process launched",
        );

        children.insert(spec.name.clone(), child);
        Ok(())
    }

    async fn phase(&self, name: &str) -> Result<ResourcePhase, RuntimeError> {
        let mut children = self.children.lock().await;
        let Some(child) = children.get_mut(name) else {
            return Ok(ResourcePhase::NotFound);
        };

        // Exited children stay in the map so the phase remains
        // queryable after completion.
        match child.try_wait()? {
            None => Ok(ResourcePhase::Active),
            Some(status) if status.success() => Ok(ResourcePhase::Succeeded),
            Some(_) => Ok(ResourcePhase::Failed),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, RuntimeError> {
        let mut children = self.children.lock().await;
        let Some(mut child) = children.remove(name) else {
            return Ok(false);
        };

        if child.try_wait()?.is_none() {
            child.start_kill()?;
            tracing::info!(name, "Runner process killed");
        }
        Ok(true)
    }
}
