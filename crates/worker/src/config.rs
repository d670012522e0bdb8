use std::time::Duration;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queues this worker pulls from, comma-separated in the env var.
    pub queues: Vec<String>,
    /// Number of concurrent worker loops.
    pub concurrency: usize,
    /// Soft time limit per task; exceeding it is an infrastructure
    /// failure.
    pub soft_time_limit: Duration,
    /// Idle sleep between claim attempts when the queues are empty.
    pub poll_interval: Duration,
    /// Name prefix recorded as `claimed_by` on claimed tasks.
    pub worker_name: String,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default        |
    /// |--------------------------------|----------------|
    /// | `SIMGATE_WORKER_QUEUES`        | `default`      |
    /// | `SIMGATE_WORKER_CONCURRENCY`   | `4`            |
    /// | `SIMGATE_SOFT_TIME_LIMIT_SECS` | `300`          |
    /// | `SIMGATE_WORKER_POLL_MS`       | `500`          |
    /// | `SIMGATE_WORKER_NAME`          | `worker`       |
    pub fn from_env() -> Self {
        let queues: Vec<String> = std::env::var("SIMGATE_WORKER_QUEUES")
            .unwrap_or_else(|_| "default".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let concurrency: usize = std::env::var("SIMGATE_WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("SIMGATE_WORKER_CONCURRENCY must be a valid usize");

        let soft_time_limit_secs: u64 = std::env::var("SIMGATE_SOFT_TIME_LIMIT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("SIMGATE_SOFT_TIME_LIMIT_SECS must be a valid u64");

        let poll_ms: u64 = std::env::var("SIMGATE_WORKER_POLL_MS")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .expect("SIMGATE_WORKER_POLL_MS must be a valid u64");

        let worker_name =
            std::env::var("SIMGATE_WORKER_NAME").unwrap_or_else(|_| "worker".into());

        Self {
            queues,
            concurrency,
            soft_time_limit: Duration::from_secs(soft_time_limit_secs),
            poll_interval: Duration::from_millis(poll_ms),
            worker_name,
        }
    }
}
