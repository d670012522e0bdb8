//! Status, result, and cancellation handlers.
//!
//! Status answers with plain text `YES`/`NO`/`FAIL`: terminal success,
//! pending-or-unknown, terminal failure. The result endpoint returns the
//! envelope or an explicit not-ready response (HTTP 202); callers never
//! see a half-built result.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use simgate_backends::{FetchOutcome, PollState};
use simgate_core::error::CoreError;
use simgate_core::registry::ProjectEntry;
use simgate_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Resolve the project entry or fail with the routing error.
fn lookup_project(state: &AppState, owner: &str, application: &str) -> AppResult<ProjectEntry> {
    state
        .registry
        .lookup(owner, application)
        .ok_or_else(|| {
            AppError::Core(CoreError::Routing {
                owner: owner.to_string(),
                application: application.to_string(),
            })
        })
}

/// GET /{owner}/{application}/status/{job_id}
///
/// Coarse status without transferring the result. An unknown job id is
/// `NO`: absence is not failure.
pub async fn status(
    State(state): State<AppState>,
    Path((owner, application, job_id)): Path<(String, String, JobId)>,
) -> AppResult<&'static str> {
    let entry = lookup_project(&state, &owner, &application)?;

    let poll = state
        .backends
        .poll(entry.backend, &owner, &application, job_id)
        .await?;

    Ok(match poll {
        PollState::Pending => "NO",
        PollState::Success => "YES",
        PollState::Fail => "FAIL",
    })
}

/// GET /{owner}/{application}/result/{job_id}
///
/// The full envelope when terminal, or 202 when not ready. Ephemeral
/// results live with the upstream consumer and also answer 202 here.
pub async fn result(
    State(state): State<AppState>,
    Path((owner, application, job_id)): Path<(String, String, JobId)>,
) -> AppResult<Response> {
    let entry = lookup_project(&state, &owner, &application)?;

    let outcome = state
        .backends
        .fetch(entry.backend, &owner, &application, job_id)
        .await?;

    Ok(match outcome {
        FetchOutcome::Ready(envelope) => Json(envelope).into_response(),
        FetchOutcome::NotReady => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "detail": "result not ready" })),
        )
            .into_response(),
        FetchOutcome::DeliveredUpstream => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "detail": "result delivered upstream" })),
        )
            .into_response(),
    })
}

/// DELETE /{owner}/{application}/job/{job_id}
///
/// Revoke a pending queue task or delete an ephemeral job resource.
/// Returns 204 on success, 409 when there is nothing cancellable (or
/// the backend has no cancellation primitive).
pub async fn cancel(
    State(state): State<AppState>,
    Path((owner, application, job_id)): Path<(String, String, JobId)>,
) -> AppResult<StatusCode> {
    let entry = lookup_project(&state, &owner, &application)?;

    let cancelled = state
        .backends
        .cancel(entry.backend, &owner, &application, job_id)
        .await?;

    if !cancelled {
        return Err(AppError::Conflict(
            "Job is not in a cancellable state".to_string(),
        ));
    }

    tracing::info!(job_id = %job_id, owner = %owner, application = %application, "Job cancelled");
    Ok(StatusCode::NO_CONTENT)
}
