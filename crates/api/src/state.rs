use std::sync::Arc;

use simgate_backends::Backends;
use simgate_core::registry::ProjectRegistry;

use crate::config::ApiConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable; the registry and adapters live behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    /// Hosted-project routing configuration, refreshed periodically.
    pub registry: Arc<ProjectRegistry>,
    /// The three backend adapters behind one dispatch point.
    pub backends: Backends,
}
