#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The `(owner, application)` pair is not in the project registry.
    ///
    /// A client error: surfaced as 404, never retried, and no backend is
    /// invoked on its behalf.
    #[error("No project registered for {owner}/{application}")]
    Routing { owner: String, application: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
