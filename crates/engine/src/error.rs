//! Error taxonomy for registry lookups, template propagation and tree walks.

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the orchestration engine.
///
/// Lookup and registration errors are configuration mistakes and are never
/// retried. Body errors wrap whatever a provider or function body returned
/// and abort the remainder of the walk.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The dotted `provider.method` name could not be parsed.
    #[error("invalid action name: '{name}' (expected 'provider.method')")]
    InvalidActionName { name: String },

    /// A required call referenced a provider or method that is not registered.
    #[error("target action does not exist: {name}")]
    ActionNotFound { name: String },

    /// A provider with the same name was registered twice.
    #[error("provider already registered: {name}")]
    DuplicateProvider { name: String },

    /// Provider names are the first dotted segment and may not contain a dot.
    #[error("invalid provider name: '{name}'")]
    InvalidProviderName { name: String },

    /// Template propagation did not reach a fixed point within the pass bound.
    #[error("template cycle detected after {passes} passes (still changing: {})", keys.join(", "))]
    TemplateCycle { passes: usize, keys: Vec<String> },

    /// A provider method failed while synthesizing an action.
    #[error("provider method '{name}' failed")]
    Provider {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A function action's `plan`, `question` or `execute` body failed.
    #[error("action '{action}' failed")]
    Body {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// The answer recorded for a function's question did not validate.
    #[error("validation failed for '{question}': {message}")]
    Validation { question: String, message: String },

    /// A shell command could not be run or exited unsuccessfully.
    #[error("shell command failed: {command}")]
    Shell {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    /// Engine configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether this error came from a misconfigured action tree rather than a failing body.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidActionName { .. }
                | Self::ActionNotFound { .. }
                | Self::DuplicateProvider { .. }
                | Self::InvalidProviderName { .. }
                | Self::Config(_)
        )
    }
}
