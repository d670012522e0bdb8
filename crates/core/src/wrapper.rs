//! The job wrapper: the execution boundary around the target callable.
//!
//! [`run_wrapped`] measures elapsed wall-clock time, invokes the
//! callable, and converts every possible outcome (return value, error,
//! or panic) into a [`ResultEnvelope`]. Nothing escapes this boundary:
//! an unhandled escape would leave the job's terminal state unobservable
//! to the caller.
//!
//! `WORKER_FAILURE` is never produced here. Infrastructure failures
//! (timeouts, killed processes) are detected by the backend adapters,
//! which synthesize their own envelopes when polling reveals an abnormal
//! terminal state.

use std::time::Instant;

use crate::envelope::ResultEnvelope;
use crate::model::ModelFn;
use crate::request::Kwargs;
use crate::types::JobId;

/// Execute the target callable and produce its terminal envelope.
///
/// The callable runs on its own spawned task so that a panic inside it
/// is captured as a join error rather than unwinding through the caller.
pub async fn run_wrapped(job_id: JobId, target: &ModelFn, kwargs: Kwargs) -> ResultEnvelope {
    let started = Instant::now();
    let joined = tokio::spawn(target(kwargs)).await;
    let elapsed = started.elapsed().as_secs_f64();

    match joined {
        Ok(Ok(outputs)) => {
            tracing::debug!(job_id = %job_id, elapsed_secs = elapsed, "Target callable succeeded");
            ResultEnvelope::success(job_id, outputs, elapsed)
        }
        Ok(Err(err)) => {
            tracing::warn!(job_id = %job_id, error = %err, "Target callable failed");
            ResultEnvelope::failure(job_id, format!("{err:?}"), elapsed)
        }
        Err(join_err) => {
            let traceback = join_error_description(join_err);
            tracing::warn!(job_id = %job_id, traceback = %traceback, "Target callable panicked");
            ResultEnvelope::failure(job_id, traceback, elapsed)
        }
    }
}

/// Produce a terminal `FAIL` envelope for a job whose callable could not
/// even be resolved (no model registered for the project action).
pub fn unresolved_model(job_id: JobId, owner: &str, application: &str, action: &str) -> ResultEnvelope {
    ResultEnvelope::failure(
        job_id,
        format!("No model registered for {owner}/{application} action {action}"),
        0.0,
    )
}

/// Render a join error (panic or cancellation) as a traceback string.
fn join_error_description(err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        match err.into_panic().downcast::<String>() {
            Ok(message) => format!("panicked: {message}"),
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => format!("panicked: {message}"),
                Err(_) => "panicked with a non-string payload".to_string(),
            },
        }
    } else {
        "task was cancelled before completion".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::JobStatus;
    use crate::model::ModelRegistry;
    use crate::request::Action;
    use serde_json::Value;

    fn model_of(registry: &ModelRegistry) -> ModelFn {
        registry.resolve("acme", "demo", Action::Sim).unwrap()
    }

    #[tokio::test]
    async fn success_produces_success_envelope_with_positive_time() {
        let mut registry = ModelRegistry::new();
        registry.register("acme", "demo", Action::Sim, |kwargs| async move {
            let x = kwargs.get("x").and_then(Value::as_i64).unwrap_or(0);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(serde_json::json!({"y": x + 1}))
        });

        let job_id = JobId::new_v4();
        let mut kwargs = Kwargs::new();
        kwargs.insert("x".into(), serde_json::json!(1));

        let env = run_wrapped(job_id, &model_of(&registry), kwargs).await;
        assert_eq!(env.status, JobStatus::Success);
        assert_eq!(env.outputs, Some(serde_json::json!({"y": 2})));
        assert!(env.traceback.is_none());
        assert_eq!(env.meta.task_times.len(), 1);
        assert!(env.meta.task_times[0] > 0.0);
        assert_eq!(env.version, "v1");
    }

    #[tokio::test]
    async fn error_produces_fail_envelope_with_traceback() {
        let mut registry = ModelRegistry::new();
        registry.register("acme", "demo", Action::Sim, |_| async {
            anyhow::bail!("input grid is empty")
        });

        let env = run_wrapped(JobId::new_v4(), &model_of(&registry), Kwargs::new()).await;
        assert_eq!(env.status, JobStatus::Fail);
        assert!(env.outputs.is_none());
        assert!(env.traceback.as_deref().unwrap().contains("input grid is empty"));
    }

    #[tokio::test]
    async fn division_panic_is_captured_not_propagated() {
        let mut registry = ModelRegistry::new();
        registry.register("acme", "demo", Action::Sim, |_| async {
            let divisor = std::hint::black_box(0_i64);
            Ok(serde_json::json!(1 / divisor))
        });

        let env = run_wrapped(JobId::new_v4(), &model_of(&registry), Kwargs::new()).await;
        assert_eq!(env.status, JobStatus::Fail);
        assert!(env.outputs.is_none());
        assert!(env.traceback.as_deref().unwrap().contains("divide by zero"));
        assert!(!env.meta.task_times.is_empty());
    }

    #[test]
    fn unresolved_model_is_a_fail_envelope() {
        let env = super::unresolved_model(JobId::new_v4(), "acme", "demo", "sim");
        assert_eq!(env.status, JobStatus::Fail);
        assert!(env.traceback.as_deref().unwrap().contains("No model registered"));
    }
}
