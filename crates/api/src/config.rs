/// Gateway configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In
/// production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Path to the project registry JSON file.
    pub registry_path: String,
    /// Seconds between periodic registry refreshes (default: `300`).
    pub registry_refresh_secs: u64,
    /// Upstream ingestion base URL for completion delivery.
    pub upstream_url: String,
    /// Bearer token for the upstream ingestion endpoints.
    pub upstream_token: String,
    /// Remote cluster scheduler base URL. When unset, an in-process
    /// scheduler executes cluster submissions.
    pub scheduler_url: Option<String>,
    /// Directory the filesystem output store writes to.
    pub outputs_dir: String,
    /// Directory the parameter store writes to.
    pub params_dir: String,
    /// Path to the runner binary spawned per ephemeral job.
    pub runner_bin: String,
    /// Parameter callback base URL handed to ephemeral units.
    pub callback_url: String,
    /// Bearer token for the parameter callback URL.
    pub callback_token: String,
}

impl ApiConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                   |
    /// |--------------------------------|---------------------------|
    /// | `HOST`                         | `0.0.0.0`                 |
    /// | `PORT`                         | `8080`                    |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                      |
    /// | `SIMGATE_REGISTRY_PATH`        | `projects.json`           |
    /// | `SIMGATE_REGISTRY_REFRESH_SECS`| `300`                     |
    /// | `SIMGATE_UPSTREAM_URL`         | `http://localhost:9000`   |
    /// | `SIMGATE_UPSTREAM_TOKEN`       | (empty)                   |
    /// | `SIMGATE_SCHEDULER_URL`        | (unset: run in-process)   |
    /// | `SIMGATE_OUTPUTS_DIR`          | `var/outputs`             |
    /// | `SIMGATE_PARAMS_DIR`           | `var/params`              |
    /// | `SIMGATE_RUNNER_BIN`           | `simgate-runner`          |
    /// | `SIMGATE_CALLBACK_URL`         | `http://localhost:9000/callback/inputs` |
    /// | `SIMGATE_CALLBACK_TOKEN`       | (empty)                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let registry_path =
            std::env::var("SIMGATE_REGISTRY_PATH").unwrap_or_else(|_| "projects.json".into());

        let registry_refresh_secs: u64 = std::env::var("SIMGATE_REGISTRY_REFRESH_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("SIMGATE_REGISTRY_REFRESH_SECS must be a valid u64");

        let upstream_url = std::env::var("SIMGATE_UPSTREAM_URL")
            .unwrap_or_else(|_| "http://localhost:9000".into());
        let upstream_token = std::env::var("SIMGATE_UPSTREAM_TOKEN").unwrap_or_default();

        let scheduler_url = std::env::var("SIMGATE_SCHEDULER_URL").ok();

        let outputs_dir =
            std::env::var("SIMGATE_OUTPUTS_DIR").unwrap_or_else(|_| "var/outputs".into());
        let params_dir =
            std::env::var("SIMGATE_PARAMS_DIR").unwrap_or_else(|_| "var/params".into());

        let runner_bin =
            std::env::var("SIMGATE_RUNNER_BIN").unwrap_or_else(|_| "simgate-runner".into());
        let callback_url = std::env::var("SIMGATE_CALLBACK_URL")
            .unwrap_or_else(|_| "http://localhost:9000/callback/inputs".into());
        let callback_token = std::env::var("SIMGATE_CALLBACK_TOKEN").unwrap_or_default();

        Self {
            host,
            port,
            request_timeout_secs,
            registry_path,
            registry_refresh_secs,
            upstream_url,
            upstream_token,
            scheduler_url,
            outputs_dir,
            params_dir,
            runner_bin,
            callback_url,
            callback_token,
        }
    }
}
