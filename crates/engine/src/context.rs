//! Opaque per-invocation context handed to providers and function bodies.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;

/// A shared, mutable JSON document.
///
/// The engine never interprets the contents; providers read and write it
/// (for example to record project settings or Bicep fragments).
#[derive(Clone, Default)]
pub struct JsonCell {
    inner: Arc<Mutex<Value>>,
}

impl fmt::Debug for JsonCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.lock(), f)
    }
}

impl JsonCell {
    pub fn new(value: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current document.
    pub fn get(&self) -> Value {
        self.lock().clone()
    }

    /// Replaces the document, returning the previous one.
    pub fn replace(&self, value: Value) -> Value {
        std::mem::replace(&mut *self.lock(), value)
    }

    /// Mutates the document in place under the lock.
    pub fn update<R>(&self, apply: impl FnOnce(&mut Value) -> R) -> R {
        apply(&mut self.lock())
    }
}

/// Context passed unchanged through resolve, plan and execute.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Root of the project being operated on, when there is one.
    pub project_path: Option<PathBuf>,
    /// Target environment name (`dev`, `staging`, ...).
    pub env_name: Option<String>,
    /// Project settings document owned by resource providers.
    pub project_setting: JsonCell,
    /// Accumulated infrastructure template fragments owned by resource providers.
    pub bicep: JsonCell,
}

impl ActionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    pub fn with_env_name(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = Some(env_name.into());
        self
    }

    pub fn with_project_setting(self, settings: Value) -> Self {
        self.project_setting.replace(settings);
        self
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}
