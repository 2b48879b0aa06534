//! Tree walkers: resolve, plan and execute.
//!
//! All three walks share the same recursion over the four action kinds and
//! differ only in their side effect:
//!
//! - `resolve` rewrites the tree, inlining call targets that are not leaf functions
//! - `plan` records human-readable lines and never runs a body or a command
//! - `execute` runs function bodies and hands shell actions to a [`ShellRunner`]
//!
//! Group and call `inputs` templates are propagated into the shared bag before
//! a node's children are visited, so later siblings observe the values
//! written by earlier ones.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    context::ActionContext,
    engine::Engine,
    error::{EngineError, EngineResult},
    inputs::InputBag,
    model::{Action, CallAction, GroupAction, GroupMode, InputTemplate},
    registry::Lookup,
    templates::propagate,
};

pub(crate) mod execute;
pub(crate) mod plan;
pub(crate) mod resolve;
pub mod shell;

pub use shell::{DescribeShellRunner, ProcessShellRunner, ShellRunner};

/// One recorded plan line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub step: u64,
    /// 1-based index of the line within the action's plan output.
    pub sub_step: usize,
    pub action: String,
    pub line: String,
}

impl fmt::Display for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan [{}.{}]: [{}] - {}", self.step, self.sub_step, self.action, self.line)
    }
}

/// Ordered output of a plan walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanReport {
    pub entries: Vec<PlanEntry>,
}

impl PlanReport {
    /// Step numbers in visiting order, one per planned function or shell action.
    pub fn steps(&self) -> Vec<u64> {
        let mut steps: Vec<u64> = self.entries.iter().map(|entry| entry.step).collect();
        steps.dedup();
        steps
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(ToString::to_string)
    }
}

/// Kind of leaf that produced an executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Function,
    Shell,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedStep {
    pub step: u64,
    pub action: String,
    pub kind: StepKind,
    pub output: Value,
}

/// Steps in completion order plus the step counter after the walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub steps: Vec<ExecutedStep>,
    pub final_step: u64,
}

impl ExecutionReport {
    pub fn step(&self, action: &str) -> Option<&ExecutedStep> {
        self.steps.iter().find(|step| step.action == action)
    }
}

/// Borrowed state shared by every node of one walk.
#[derive(Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub engine: &'a Engine,
    pub context: &'a ActionContext,
    pub inputs: &'a InputBag,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(engine: &'a Engine, context: &'a ActionContext, inputs: &'a InputBag) -> Self {
        Self { engine, context, inputs }
    }

    /// Propagates a copy of `template` into the bag, leaving the tree untouched.
    pub(crate) fn apply_inputs(&self, template: Option<&InputTemplate>) -> EngineResult<()> {
        if let Some(template) = template {
            let mut schema = template.clone();
            self.propagate(&mut schema)?;
        }
        Ok(())
    }

    pub(crate) fn propagate(&self, schema: &mut InputTemplate) -> EngineResult<()> {
        propagate(schema, self.inputs, self.engine.config().max_template_passes)
    }

    /// Looks up a call target, enforcing `required`.
    ///
    /// Returns `None` when the call should be skipped: the target is missing
    /// on an optional call, or the provider had nothing to do.
    pub(crate) async fn lookup_call(&self, call: &CallAction) -> EngineResult<Option<Action>> {
        match self.engine.registry().lookup(&call.target_action, self.context, self.inputs).await? {
            Lookup::Found(action) => Ok(Some(action)),
            Lookup::NotFound if call.required => Err(EngineError::ActionNotFound {
                name: call.target_action.clone(),
            }),
            Lookup::NotFound => {
                debug!(target = %call.target_action, "optional call target not found, skipping");
                Ok(None)
            }
            Lookup::Empty => {
                debug!(target = %call.target_action, "call target has nothing to do, skipping");
                Ok(None)
            }
        }
    }

    /// Children in visiting order: stable ascending priority for sequential
    /// groups when priority ordering is enabled, declaration order otherwise.
    pub(crate) fn ordered_children<'g>(&self, group: &'g GroupAction) -> Vec<&'g Action> {
        let mut children: Vec<&Action> = group.actions.iter().collect();
        if self.engine.config().honor_priority && group.mode == GroupMode::Sequential {
            children.sort_by_key(|child| child.priority());
        }
        children
    }
}
