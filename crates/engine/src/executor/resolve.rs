use futures_util::future::BoxFuture;
use tracing::debug;

use crate::{
    error::EngineResult,
    model::{Action, GroupAction, InputTemplate},
    registry::Lookup,
};

use super::Scope;

/// Rewrites `action`, inlining every call whose target is not a leaf function.
///
/// Templates are propagated in place so the returned tree carries rendered
/// inputs. Calls to functions and calls whose target is missing or empty are
/// kept as they are; a later plan or execute walk honors `required`.
pub(crate) fn resolve_node(scope: Scope<'_>, action: Action) -> BoxFuture<'_, EngineResult<Action>> {
    Box::pin(async move {
        match action {
            Action::Call(mut call) => {
                if let Some(template) = call.inputs.as_mut() {
                    scope.propagate(template)?;
                }
                let lookup = scope
                    .engine
                    .registry()
                    .lookup(&call.target_action, scope.context, scope.inputs)
                    .await?;
                match lookup {
                    Lookup::Found(Action::Function(_)) | Lookup::Empty | Lookup::NotFound => Ok(Action::Call(call)),
                    Lookup::Found(target) => {
                        debug!(target = %call.target_action, kind = target.kind(), "inlining call target");
                        let resolved = resolve_node(scope, target).await?;
                        Ok(attach_inputs(resolved, call.inputs))
                    }
                }
            }
            Action::Group(mut group) => {
                if let Some(template) = group.inputs.as_mut() {
                    scope.propagate(template)?;
                }
                let children = std::mem::take(&mut group.actions);
                let mut resolved = Vec::with_capacity(children.len());
                for child in children {
                    resolved.push(resolve_node(scope, child).await?);
                }
                group.actions = resolved;
                Ok(Action::Group(group))
            }
            leaf @ (Action::Function(_) | Action::Shell(_)) => Ok(leaf),
        }
    })
}

/// Re-attaches a spliced call's inputs so later walks still propagate them.
fn attach_inputs(action: Action, inputs: Option<InputTemplate>) -> Action {
    let Some(inputs) = inputs else {
        return action;
    };
    match action {
        Action::Group(mut group) if group.inputs.is_none() => {
            group.inputs = Some(inputs);
            Action::Group(group)
        }
        other => {
            let priority = other.priority();
            Action::Group(GroupAction::sequential(vec![other]).with_inputs(inputs).with_priority(priority))
        }
    }
}
