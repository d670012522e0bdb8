//! Route definitions for the gateway.
//!
//! ```text
//! GET    /health                                    -> liveness
//! POST   /{owner}/{application}/{action}            -> submit
//! GET    /{owner}/{application}/status/{job_id}     -> YES / NO / FAIL
//! GET    /{owner}/{application}/result/{job_id}     -> envelope or 202
//! DELETE /{owner}/{application}/job/{job_id}        -> cancel
//! ```

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the gateway route tree.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/{owner}/{application}/{action}",
            post(handlers::submit::submit),
        )
        .route(
            "/{owner}/{application}/status/{job_id}",
            get(handlers::jobs::status),
        )
        .route(
            "/{owner}/{application}/result/{job_id}",
            get(handlers::jobs::result),
        )
        .route(
            "/{owner}/{application}/job/{job_id}",
            delete(handlers::jobs::cancel),
        )
}
