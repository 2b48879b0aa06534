//! # Action Model
//!
//! An [`Action`] is one schedulable unit of work. Lifecycle operations
//! (`create`, `provision`, `deploy`, ...) are expressed as trees of actions
//! synthesized by registered providers and then walked by the executor.
//!
//! ## Variants
//!
//! - **Group**: an ordered list of child actions run in sequence or in parallel
//! - **Call**: a reference to a named action (`provider.method`) looked up in the registry
//! - **Function**: a native body with `plan` / `question` / `execute` hooks
//! - **Shell**: a shell command delegated to the configured shell runner
//!
//! Groups and calls may carry an `inputs` template which is propagated into
//! the shared input bag before the node is walked.
//!
//! ## Usage
//!
//! ```rust
//! use fxflow_engine::model::{Action, CallAction, GroupAction, ShellAction};
//!
//! let provision = GroupAction::sequential(vec![
//!     CallAction::optional("aad.provision").into(),
//!     CallAction::required("azure-web-app.provision").into(),
//!     ShellAction::new("npm run build", "build the tab frontend").into(),
//! ])
//! .named("teams-bot.provision");
//!
//! let action = Action::from(provision);
//! assert_eq!(action.display_name(), "teams-bot.provision");
//! ```

use std::{fmt, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use serde_json::{Map as JsonMap, Value};

use crate::{context::ActionContext, inputs::InputBag, question::Question};

/// Template object propagated into the input bag.
pub type InputTemplate = JsonMap<String, Value>;

/// Advisory ordering hint within a sequential group. Lower runs earlier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionPriority {
    P0,
    P1,
    P2,
    #[default]
    P3,
    P4,
    P5,
    P6,
}

/// Execution mode of a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    #[default]
    Sequential,
    Parallel,
}

/// A closed union of the four action kinds.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Group(GroupAction),
    Call(CallAction),
    Function(FunctionAction),
    Shell(ShellAction),
}

impl Action {
    /// Human-readable name used in plan output, logs and errors.
    pub fn display_name(&self) -> String {
        match self {
            Action::Group(group) => group.name.clone().unwrap_or_else(|| "<anonymous group>".to_string()),
            Action::Call(call) => call.name.clone().unwrap_or_else(|| call.target_action.clone()),
            Action::Function(function) => function.name.clone(),
            Action::Shell(shell) => shell.name.clone().unwrap_or_else(|| shell.description.clone()),
        }
    }

    pub fn priority(&self) -> ActionPriority {
        match self {
            Action::Group(group) => group.priority,
            Action::Call(call) => call.priority,
            Action::Function(function) => function.priority,
            Action::Shell(shell) => shell.priority,
        }
    }

    /// Short tag of the variant (`group`, `call`, `function`, `shell`).
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Group(_) => "group",
            Action::Call(_) => "call",
            Action::Function(_) => "function",
            Action::Shell(_) => "shell",
        }
    }

    /// Structural JSON form of the tree; function bodies appear by name only.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<GroupAction> for Action {
    fn from(group: GroupAction) -> Self {
        Action::Group(group)
    }
}

impl From<CallAction> for Action {
    fn from(call: CallAction) -> Self {
        Action::Call(call)
    }
}

impl From<FunctionAction> for Action {
    fn from(function: FunctionAction) -> Self {
        Action::Function(function)
    }
}

impl From<ShellAction> for Action {
    fn from(shell: ShellAction) -> Self {
        Action::Shell(shell)
    }
}

/// A group of child actions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub mode: GroupMode,
    pub actions: Vec<Action>,
    /// Template merged into the input bag before any child runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<InputTemplate>,
    pub priority: ActionPriority,
}

impl GroupAction {
    pub fn new(mode: GroupMode, actions: Vec<Action>) -> Self {
        Self {
            mode,
            actions,
            ..Self::default()
        }
    }

    pub fn sequential(actions: Vec<Action>) -> Self {
        Self::new(GroupMode::Sequential, actions)
    }

    pub fn parallel(actions: Vec<Action>) -> Self {
        Self::new(GroupMode::Parallel, actions)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_inputs(mut self, inputs: InputTemplate) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// A reference to a named action resolved through the registry.
#[derive(Debug, Clone, Serialize)]
pub struct CallAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// When true a missing target aborts the walk; otherwise the call is skipped.
    pub required: bool,
    /// Dotted `provider.method` reference.
    #[serde(rename = "targetAction")]
    pub target_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<InputTemplate>,
    pub priority: ActionPriority,
}

impl CallAction {
    pub fn new(target_action: impl Into<String>, required: bool) -> Self {
        Self {
            name: None,
            required,
            target_action: target_action.into(),
            inputs: None,
            priority: ActionPriority::default(),
        }
    }

    pub fn required(target_action: impl Into<String>) -> Self {
        Self::new(target_action, true)
    }

    pub fn optional(target_action: impl Into<String>) -> Self {
        Self::new(target_action, false)
    }

    pub fn with_inputs(mut self, inputs: InputTemplate) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Native body of a function action.
///
/// `plan` must not mutate state; `execute` is the only place with real side
/// effects and may read and write both the context and the input bag.
#[async_trait]
pub trait FunctionBody: Send + Sync {
    /// Human-readable description of the intended effects.
    async fn plan(&self, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Vec<String>>;

    /// The input this body depends on, validated before `execute` runs.
    async fn question(&self, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Question>> {
        Ok(None)
    }

    async fn execute(&self, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Value>;
}

/// A named function action wrapping a [`FunctionBody`].
#[derive(Clone)]
pub struct FunctionAction {
    pub name: String,
    pub priority: ActionPriority,
    body: Arc<dyn FunctionBody>,
}

impl fmt::Debug for FunctionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionAction")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Serialize for FunctionAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FunctionAction", 2)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("priority", &self.priority)?;
        state.end()
    }
}

impl FunctionAction {
    pub fn new(name: impl Into<String>, body: impl FunctionBody + 'static) -> Self {
        Self::from_arc(name, Arc::new(body))
    }

    pub fn from_arc(name: impl Into<String>, body: Arc<dyn FunctionBody>) -> Self {
        Self {
            name: name.into(),
            priority: ActionPriority::default(),
            body,
        }
    }

    /// Builds a function action from a fixed plan line and a synchronous body.
    pub fn inline<F>(name: impl Into<String>, plan: impl Into<String>, execute: F) -> Self
    where
        F: Fn(&ActionContext, &InputBag) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(
            name,
            InlineBody {
                plan: plan.into(),
                execute,
            },
        )
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn body(&self) -> &dyn FunctionBody {
        self.body.as_ref()
    }
}

struct InlineBody<F> {
    plan: String,
    execute: F,
}

#[async_trait]
impl<F> FunctionBody for InlineBody<F>
where
    F: Fn(&ActionContext, &InputBag) -> anyhow::Result<Value> + Send + Sync,
{
    async fn plan(&self, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        Ok(vec![self.plan.clone()])
    }

    async fn execute(&self, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Value> {
        (self.execute)(context, inputs)
    }
}

/// A shell command. The core only describes it; running it is delegated to a
/// [`ShellRunner`](crate::executor::ShellRunner).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShellAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    pub description: String,
    pub priority: ActionPriority,
}

impl ShellAction {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Converts a JSON object literal into an [`InputTemplate`]; other values yield an empty template.
pub fn template(value: Value) -> InputTemplate {
    match value {
        Value::Object(map) => map,
        _ => InputTemplate::new(),
    }
}
