use crate::params::ParamStoreError;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The queue broker (database) failed.
    #[error("Broker error: {0}")]
    Broker(#[from] sqlx::Error),

    /// The cluster scheduler rejected or lost a request.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// The ephemeral runtime could not launch or inspect a resource.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The durable parameter store failed.
    #[error("Parameter store error: {0}")]
    ParamStore(#[from] ParamStoreError),

    /// Cancellation was requested for a backend without a cancellation
    /// primitive.
    #[error("The cluster backend has no cancellation primitive")]
    CancelUnsupported,
}
