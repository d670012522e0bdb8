//! Job submission types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::JobId;

/// Keyword arguments passed to the target callable.
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

/// The operation a submission asks a hosted project to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Fetch the project's input form description. Lightweight, synchronous.
    InputsGet,
    /// Parse and validate submitted inputs. Lightweight, synchronous.
    InputsParse,
    /// Run the full simulation. The only action eligible for cluster or
    /// ephemeral execution.
    Sim,
}

impl Action {
    /// Wire name used in URLs and queue target strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::InputsGet => "inputs_get",
            Action::InputsParse => "inputs_parse",
            Action::Sim => "sim",
        }
    }

    /// Whether callers block on the result instead of polling for it.
    pub fn is_synchronous(self) -> bool {
        matches!(self, Action::InputsGet | Action::InputsParse)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inputs_get" => Ok(Action::InputsGet),
            "inputs_parse" => Ok(Action::InputsParse),
            "sim" => Ok(Action::Sim),
            other => Err(CoreError::Validation(format!("Unknown action: {other}"))),
        }
    }
}

/// One submission of a hosted project's computation.
///
/// `job_id` is the sole handle used for status lookup and result
/// correlation. It is caller-supplied or generated at submission time and
/// must be globally unique per submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub owner: String,
    pub application: String,
    pub action: Action,
    pub job_id: JobId,
    pub kwargs: Kwargs,
}

impl JobRequest {
    /// Create a request with a freshly generated job id.
    pub fn new(
        owner: impl Into<String>,
        application: impl Into<String>,
        action: Action,
        kwargs: Kwargs,
    ) -> Self {
        Self::with_job_id(owner, application, action, JobId::new_v4(), kwargs)
    }

    /// Create a request with a caller-assigned job id.
    pub fn with_job_id(
        owner: impl Into<String>,
        application: impl Into<String>,
        action: Action,
        job_id: JobId,
        kwargs: Kwargs,
    ) -> Self {
        Self {
            owner: owner.into(),
            application: application.into(),
            action,
            job_id,
            kwargs,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_wire_names_round_trip() {
        for action in [Action::InputsGet, Action::InputsParse, Action::Sim] {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn unknown_action_rejected() {
        assert!("optimize".parse::<Action>().is_err());
    }

    #[test]
    fn inputs_actions_are_synchronous() {
        assert!(Action::InputsGet.is_synchronous());
        assert!(Action::InputsParse.is_synchronous());
        assert!(!Action::Sim.is_synchronous());
    }

    #[test]
    fn new_request_assigns_unique_job_ids() {
        let a = JobRequest::new("acme", "demo", Action::Sim, Kwargs::new());
        let b = JobRequest::new("acme", "demo", Action::Sim, Kwargs::new());
        assert_ne!(a.job_id, b.job_id);
    }
}
