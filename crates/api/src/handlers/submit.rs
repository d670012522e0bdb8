//! Submission handler.
//!
//! `POST /{owner}/{application}/{action}` with the kwargs JSON object as
//! body. Routing happens before any backend side effect: an
//! unregistered project is rejected with 404 and nothing is submitted.
//! Synchronous actions block on the result and return the full
//! envelope; asynchronous actions return 202 with the job id.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use simgate_core::request::{Action, JobRequest, Kwargs};
use simgate_core::router::{route, RouteTarget};
use simgate_core::types::JobId;
use simgate_core::validation::validate_name;

use crate::error::AppResult;
use crate::state::AppState;

/// Optional query parameters for submission.
#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    /// Caller-assigned job id; generated when absent.
    pub job_id: Option<JobId>,
}

/// POST /{owner}/{application}/{action}
pub async fn submit(
    State(state): State<AppState>,
    Path((owner, application, action)): Path<(String, String, String)>,
    Query(query): Query<SubmitQuery>,
    Json(kwargs): Json<Kwargs>,
) -> AppResult<Response> {
    validate_name("owner", &owner)?;
    validate_name("application", &application)?;
    let action: Action = action.parse()?;

    let request = match query.job_id {
        Some(job_id) => JobRequest::with_job_id(owner, application, action, job_id, kwargs),
        None => JobRequest::new(owner, application, action, kwargs),
    };

    // Resolve the route first; an unknown project must fail with no
    // submission side effect.
    let target = route(&state.registry, &request)?;

    tracing::info!(
        job_id = %request.job_id,
        owner = %request.owner,
        application = %request.application,
        action = %request.action,
        "Job submitted",
    );

    if request.action.is_synchronous() {
        if let RouteTarget::Queue {
            queue_name,
            task_name,
        } = &target
        {
            let envelope = state
                .backends
                .queue
                .run_sync(&request, queue_name, task_name)
                .await?;
            return Ok(Json(envelope).into_response());
        }
    }

    let receipt = state.backends.submit(&request, &target).await?;
    Ok((StatusCode::ACCEPTED, Json(receipt)).into_response())
}
