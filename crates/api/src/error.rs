use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use simgate_backends::BackendError;
use simgate_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`BackendError`] for
/// adapter failures. Implements [`IntoResponse`] to produce consistent
/// JSON error responses; callers never see a raw stack trace.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `simgate_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A backend adapter failure.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A conflict with the job's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Routing { owner, application } => (
                    StatusCode::NOT_FOUND,
                    "UNKNOWN_PROJECT",
                    format!("No project registered for {owner}/{application}"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Registry(msg) | CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Backend adapter errors ---
            AppError::Backend(BackendError::CancelUnsupported) => (
                StatusCode::CONFLICT,
                "CANCEL_UNSUPPORTED",
                "The cluster backend has no cancellation primitive".to_string(),
            ),
            AppError::Backend(err) => {
                tracing::error!(error = %err, "Backend error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "BACKEND_ERROR",
                    "A backend error occurred".to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
