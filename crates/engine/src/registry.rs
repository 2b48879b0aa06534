//! Named-action registry.
//!
//! Providers register once under a name that forms the first segment of a
//! dotted `provider.method` action name. Lookup parses the name explicitly,
//! routes to the provider and asks it to synthesize an action tree for the
//! method. After initialization the registry is read-only and shared by `Arc`.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    context::ActionContext,
    error::{EngineError, EngineResult},
    inputs::InputBag,
    model::Action,
};

/// A pluggable resource provider contributing named actions.
#[async_trait]
pub trait ActionProvider: Send + Sync {
    /// Method names this provider can synthesize actions for.
    fn methods(&self) -> &[&'static str];

    /// Synthesizes the action tree for `method`.
    ///
    /// `Ok(None)` means the method exists but has nothing to do in the
    /// current state, which is distinct from the method not existing.
    async fn get_action(&self, method: &str, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Option<Action>>;
}

/// Outcome of a registry lookup.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The provider synthesized an action.
    Found(Action),
    /// The provider and method exist but returned nothing to do.
    Empty,
    /// No such provider, or the provider lacks the method.
    NotFound,
}

impl Lookup {
    pub fn into_action(self) -> Option<Action> {
        match self {
            Lookup::Found(action) => Some(action),
            Lookup::Empty | Lookup::NotFound => None,
        }
    }
}

/// Parsed dotted action name in `provider.method` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionName<'a> {
    pub provider: &'a str,
    pub method: &'a str,
}

impl<'a> ActionName<'a> {
    /// Parse an action name in `provider.method` format.
    ///
    /// # Arguments
    /// - `name`: Raw dotted action name.
    ///
    /// # Returns
    /// Returns the split name when it contains a dot with non-empty segments on
    /// both sides; everything after the first dot is the method.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidActionName`] otherwise.
    pub fn parse(name: &'a str) -> EngineResult<Self> {
        match name.split_once('.') {
            Some((provider, method)) if !provider.is_empty() && !method.is_empty() => Ok(Self { provider, method }),
            _ => Err(EngineError::InvalidActionName { name: name.to_string() }),
        }
    }
}

impl fmt::Display for ActionName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.provider, self.method)
    }
}

/// Map from provider name to provider implementation, in registration order.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    providers: IndexMap<String, Arc<dyn ActionProvider>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under `name`.
    ///
    /// Names must be non-empty, may not contain a dot and must be unique.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn ActionProvider>) -> EngineResult<()> {
        let name = name.into();
        if name.is_empty() || name.contains('.') {
            return Err(EngineError::InvalidProviderName { name });
        }
        if self.providers.contains_key(&name) {
            return Err(EngineError::DuplicateProvider { name });
        }
        debug!(provider = %name, methods = provider.methods().len(), "registered action provider");
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Registered provider names in registration order.
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Methods declared by `provider`, or `None` when it is not registered.
    pub fn methods(&self, provider: &str) -> Option<&[&'static str]> {
        self.providers.get(provider).map(|provider| provider.methods())
    }

    /// Looks up `name` and asks the owning provider to synthesize an action.
    pub async fn lookup(&self, name: &str, context: &ActionContext, inputs: &InputBag) -> EngineResult<Lookup> {
        let parsed = ActionName::parse(name)?;
        let Some(provider) = self.providers.get(parsed.provider) else {
            debug!(action = %name, "provider not registered");
            return Ok(Lookup::NotFound);
        };
        if !provider.methods().contains(&parsed.method) {
            debug!(action = %name, "provider does not declare method");
            return Ok(Lookup::NotFound);
        }

        let synthesized = provider
            .get_action(parsed.method, context, inputs)
            .await
            .map_err(|source| EngineError::Provider {
                name: name.to_string(),
                source,
            })?;
        match synthesized {
            Some(action) => {
                debug!(action = %name, kind = action.kind(), "provider synthesized action");
                Ok(Lookup::Found(action))
            }
            None => {
                debug!(action = %name, "provider has nothing to do");
                Ok(Lookup::Empty)
            }
        }
    }
}
