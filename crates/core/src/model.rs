//! Registry of target callables.
//!
//! Each hosted project supplies one opaque async callable per action.
//! The gateway treats them as black boxes: kwargs in, JSON value or
//! error out. Deployments register their models at process startup;
//! a task arriving for an unregistered model terminates as a `FAIL`
//! envelope, not a crash.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::request::{Action, Kwargs};

/// Boxed future returned by a model invocation.
pub type ModelFuture = Pin<Box<dyn Future<Output = Result<Value, anyhow::Error>> + Send>>;

/// An opaque target callable.
pub type ModelFn = Arc<dyn Fn(Kwargs) -> ModelFuture + Send + Sync>;

/// Maps `(owner, application, action)` to the callable that serves it.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<(String, String, Action), ModelFn>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable for one project action.
    pub fn register<F, Fut>(
        &mut self,
        owner: impl Into<String>,
        application: impl Into<String>,
        action: Action,
        f: F,
    ) where
        F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, anyhow::Error>> + Send + 'static,
    {
        self.models.insert(
            (owner.into(), application.into(), action),
            Arc::new(move |kwargs| Box::pin(f(kwargs))),
        );
    }

    /// Resolve the callable for a project action, if one is registered.
    pub fn resolve(&self, owner: &str, application: &str, action: Action) -> Option<ModelFn> {
        self.models
            .get(&(owner.to_string(), application.to_string(), action))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
