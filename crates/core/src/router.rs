//! Task routing: `(owner, application, action)` → backend target.
//!
//! Routing is pure apart from the registry lookup. An unregistered
//! project is a [`CoreError::Routing`] surfaced to the caller as a client
//! error; no backend is ever invoked for it. `sim` is the only action
//! eligible for cluster or ephemeral execution; inputs actions always
//! resolve to the project's queue.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::registry::{BackendKind, ProjectRegistry, ResourceSpec};
use crate::request::{Action, JobRequest};
use crate::types::JobId;

/// Resolved execution target for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouteTarget {
    /// Enqueue onto a named broker queue under the routing-contract task
    /// name `"{owner}_{application}_tasks.{action}"`.
    Queue {
        queue_name: String,
        task_name: String,
    },
    /// Submit to the cluster scheduler under a deterministic future key.
    Cluster {
        future_key: String,
        timeout_secs: Option<u64>,
    },
    /// Launch a one-shot execution unit under a DNS-safe resource name.
    Ephemeral {
        job_name: String,
        resources: ResourceSpec,
    },
}

/// Queue target string. This format is a compatibility contract consumed
/// by the broker's routing configuration; never change its shape.
pub fn queue_task_name(owner: &str, application: &str, action: Action) -> String {
    format!("{owner}_{application}_tasks.{action}")
}

/// Deterministic cluster future key for a job.
///
/// Caller-suppliable, so the status service can resolve the future later
/// without retaining local state.
pub fn cluster_future_key(job_id: JobId) -> String {
    format!("sim-{job_id}")
}

/// DNS-safe resource name for an ephemeral job.
pub fn ephemeral_job_name(owner: &str, application: &str, job_id: JobId) -> String {
    let sanitize = |s: &str| -> String {
        s.to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect()
    };
    format!("{}-{}-{job_id}", sanitize(owner), sanitize(application))
}

/// Resolve a request to its execution target.
pub fn route(registry: &ProjectRegistry, request: &JobRequest) -> Result<RouteTarget, CoreError> {
    let entry = registry
        .lookup(&request.owner, &request.application)
        .ok_or_else(|| CoreError::Routing {
            owner: request.owner.clone(),
            application: request.application.clone(),
        })?;

    // Inputs actions are lightweight and always run on the queue,
    // whatever backend the project's sim action uses.
    if request.action.is_synchronous() {
        return Ok(RouteTarget::Queue {
            task_name: queue_task_name(&request.owner, &request.application, request.action),
            queue_name: entry.queue_name,
        });
    }

    match entry.backend {
        BackendKind::Queue => Ok(RouteTarget::Queue {
            task_name: queue_task_name(&request.owner, &request.application, request.action),
            queue_name: entry.queue_name,
        }),
        BackendKind::Cluster => Ok(RouteTarget::Cluster {
            future_key: cluster_future_key(request.job_id),
            timeout_secs: entry.resources.cluster_timeout_secs,
        }),
        BackendKind::Ephemeral => Ok(RouteTarget::Ephemeral {
            job_name: ephemeral_job_name(&request.owner, &request.application, request.job_id),
            resources: entry.resources,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProjectEntry;
    use crate::request::Kwargs;
    use assert_matches::assert_matches;

    fn registry_with(backend: BackendKind) -> ProjectRegistry {
        ProjectRegistry::from_entries(vec![ProjectEntry {
            owner: "acme".into(),
            application: "demo".into(),
            backend,
            queue_name: "acme_demo_tasks".into(),
            resources: ResourceSpec {
                cluster_timeout_secs: Some(300),
                ..Default::default()
            },
        }])
        .unwrap()
    }

    fn request(action: Action) -> JobRequest {
        JobRequest::new("acme", "demo", action, Kwargs::new())
    }

    #[test]
    fn queue_task_name_matches_routing_contract() {
        assert_eq!(
            queue_task_name("acme", "demo", Action::Sim),
            "acme_demo_tasks.sim"
        );
        assert_eq!(
            queue_task_name("acme", "demo", Action::InputsParse),
            "acme_demo_tasks.inputs_parse"
        );
    }

    #[test]
    fn unknown_project_is_routing_error() {
        let registry = registry_with(BackendKind::Queue);
        let req = JobRequest::new("ghost", "demo", Action::Sim, Kwargs::new());
        assert_matches!(
            route(&registry, &req),
            Err(CoreError::Routing { owner, .. }) if owner == "ghost"
        );
    }

    #[test]
    fn sim_routes_to_configured_backend() {
        let registry = registry_with(BackendKind::Cluster);
        let req = request(Action::Sim);
        let target = route(&registry, &req).unwrap();
        assert_matches!(target, RouteTarget::Cluster { future_key, timeout_secs }
            if future_key == format!("sim-{}", req.job_id) && timeout_secs == Some(300));
    }

    #[test]
    fn inputs_actions_route_to_queue_even_on_cluster_projects() {
        let registry = registry_with(BackendKind::Cluster);
        let target = route(&registry, &request(Action::InputsParse)).unwrap();
        assert_matches!(target, RouteTarget::Queue { task_name, .. }
            if task_name == "acme_demo_tasks.inputs_parse");
    }

    #[test]
    fn inputs_actions_route_to_queue_even_on_ephemeral_projects() {
        let registry = registry_with(BackendKind::Ephemeral);
        let target = route(&registry, &request(Action::InputsGet)).unwrap();
        assert_matches!(target, RouteTarget::Queue { .. });
    }

    #[test]
    fn routing_is_deterministic() {
        let registry = registry_with(BackendKind::Queue);
        let req = request(Action::Sim);
        let first = route(&registry, &req).unwrap();
        let second = route(&registry, &req).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn ephemeral_job_name_is_dns_safe() {
        let id = JobId::new_v4();
        let name = ephemeral_job_name("Acme_Corp", "Demo", id);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(name.ends_with(&id.to_string()));
    }
}
