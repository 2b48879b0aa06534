//! # Fxflow Engine
//!
//! The fxflow engine composes lifecycle operations (create, provision, deploy)
//! out of reusable actions contributed by independently registered resource
//! providers, and walks the resulting trees in three modes.
//!
//! ## Key Features
//!
//! - **Action Model**: group, call, function and shell actions with advisory priorities
//! - **Registry**: dotted `provider.method` addressing over explicitly registered providers
//! - **Template Propagation**: fixed-point `{{ path }}` substitution into a shared input bag
//! - **Tree Walkers**: resolve (inline calls), plan (dry run) and execute (side effects)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use fxflow_engine::{
//!     ActionContext, ActionProvider, ActionRegistry, Engine, InputBag,
//!     model::{Action, CallAction, FunctionAction, GroupAction},
//! };
//! use serde_json::json;
//!
//! struct Storage;
//!
//! #[async_trait::async_trait]
//! impl ActionProvider for Storage {
//!     fn methods(&self) -> &[&'static str] {
//!         &["provision"]
//!     }
//!
//!     async fn get_action(&self, _method: &str, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Action>> {
//!         Ok(Some(
//!             FunctionAction::inline("storage.provision", "create a storage account", |_, inputs| {
//!                 inputs.set("storage.endpoint", "https://demo.blob.core.windows.net");
//!                 Ok(json!({"created": true}))
//!             })
//!             .into(),
//!         ))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ActionRegistry::new();
//! registry.register("storage", Arc::new(Storage))?;
//! let engine = Engine::new(registry);
//!
//! let action: Action = GroupAction::sequential(vec![CallAction::required("storage.provision").into()]).into();
//! let context = ActionContext::new();
//! let inputs = InputBag::new();
//!
//! let plan = engine.plan_action(&action, &context, &inputs).await?;
//! assert_eq!(plan.entries[0].to_string(), "plan [1.1]: [storage.provision] - create a storage account");
//!
//! let inputs = InputBag::new();
//! engine.execute_action(&action, &context, &inputs).await?;
//! assert_eq!(inputs.get_str("storage.endpoint").as_deref(), Some("https://demo.blob.core.windows.net"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`model`**: the action variants and the `FunctionBody` contract
//! - **`registry`**: provider registration and dotted-name lookup
//! - **`templates`**: the template propagator
//! - **`executor`**: the resolve, plan and execute walkers and the shell runner seam
//! - **`config`**: engine tunables loaded from YAML

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod inputs;
pub mod model;
pub mod question;
pub mod registry;
pub mod templates;

pub use config::{EngineConfig, ShellMode};
pub use context::{ActionContext, JsonCell};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use executor::{
    DescribeShellRunner, ExecutedStep, ExecutionReport, PlanEntry, PlanReport, ProcessShellRunner, ShellRunner, StepKind,
};
pub use inputs::InputBag;
pub use model::{Action, ActionPriority, FunctionBody, GroupMode};
pub use question::{Question, Validation};
pub use registry::{ActionProvider, ActionRegistry, Lookup};
