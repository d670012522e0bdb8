//! Project registry: which backend each hosted project runs on.
//!
//! [`ProjectRegistry`] is an explicitly owned, periodically refreshed
//! snapshot of the hosted-project configuration. It is loaded from a JSON
//! file at construction and re-read only when [`refresh`] is called,
//! never as an import-time or mid-request side effect. Lookups read a
//! shared snapshot and never mutate it.
//!
//! [`refresh`]: ProjectRegistry::refresh

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The execution substrate a project's `sim` action runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Queue,
    Cluster,
    Ephemeral,
}

/// Resource hints for cluster and ephemeral execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Container image for ephemeral jobs.
    #[serde(default)]
    pub image: Option<String>,
    /// CPU request, scheduler-native syntax (e.g. `"2"`).
    #[serde(default)]
    pub cpu: Option<String>,
    /// Memory request, scheduler-native syntax (e.g. `"4Gi"`).
    #[serde(default)]
    pub memory: Option<String>,
    /// Cluster execution timeout, seconds.
    #[serde(default)]
    pub cluster_timeout_secs: Option<u64>,
}

/// One hosted project's routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub owner: String,
    pub application: String,
    pub backend: BackendKind,
    pub queue_name: String,
    #[serde(default)]
    pub resources: ResourceSpec,
}

/// On-disk registry file shape.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    projects: Vec<ProjectEntry>,
}

/// Read-only (between refreshes) map of hosted projects.
pub struct ProjectRegistry {
    /// Source file; `None` for registries built directly from entries.
    path: Option<PathBuf>,
    entries: RwLock<HashMap<(String, String), ProjectEntry>>,
}

impl ProjectRegistry {
    /// Load the registry from a JSON file, failing on parse errors or
    /// duplicate `(owner, application)` pairs.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let registry = Self {
            path: Some(path.into()),
            entries: RwLock::new(HashMap::new()),
        };
        registry.refresh()?;
        Ok(registry)
    }

    /// Build a registry directly from entries (tests, embedded config).
    /// `refresh` is a no-op for such registries.
    pub fn from_entries(entries: Vec<ProjectEntry>) -> Result<Self, CoreError> {
        let map = Self::index(entries)?;
        Ok(Self {
            path: None,
            entries: RwLock::new(map),
        })
    }

    /// Re-read the registry file and atomically swap the snapshot.
    ///
    /// Returns the number of projects loaded. In-flight lookups keep
    /// seeing the old snapshot until the swap.
    pub fn refresh(&self) -> Result<usize, CoreError> {
        let Some(path) = &self.path else {
            return Ok(self.entries.read().expect("registry lock poisoned").len());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Registry(format!("Cannot read {}: {e}", path.display()))
        })?;
        let file: RegistryFile = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Registry(format!("Cannot parse {}: {e}", path.display()))
        })?;

        let map = Self::index(file.projects)?;
        let count = map.len();
        *self.entries.write().expect("registry lock poisoned") = map;
        Ok(count)
    }

    /// Resolve a project. `None` means the pair is unregistered; the
    /// caller turns that into a routing error, never a silent default.
    pub fn lookup(&self, owner: &str, application: &str) -> Option<ProjectEntry> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(&(owner.to_string(), application.to_string()))
            .cloned()
    }

    /// Number of registered projects.
    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(
        entries: Vec<ProjectEntry>,
    ) -> Result<HashMap<(String, String), ProjectEntry>, CoreError> {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = (entry.owner.clone(), entry.application.clone());
            if map.insert(key, entry.clone()).is_some() {
                return Err(CoreError::Registry(format!(
                    "Duplicate project entry: {}/{}",
                    entry.owner, entry.application
                )));
            }
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
