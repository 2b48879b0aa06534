use futures_util::future::BoxFuture;
use tracing::info;

use crate::{
    error::{EngineError, EngineResult},
    model::Action,
};

use super::{PlanEntry, PlanReport, Scope};

/// Dry-run walk. Groups are described in declaration order whatever their
/// mode; no execute body or shell command is ever invoked.
pub(crate) fn plan_node<'a>(scope: Scope<'a>, action: &'a Action, report: &'a mut PlanReport) -> BoxFuture<'a, EngineResult<()>> {
    Box::pin(async move {
        match action {
            Action::Function(function) => {
                let lines = function
                    .body()
                    .plan(scope.context, scope.inputs)
                    .await
                    .map_err(|source| EngineError::Body {
                        action: function.name.clone(),
                        source,
                    })?;
                let step = scope.inputs.next_step();
                for (index, line) in lines.into_iter().enumerate() {
                    record(report, step, index + 1, &function.name, line);
                }
            }
            Action::Shell(shell) => {
                let step = scope.inputs.next_step();
                record(report, step, 1, &action.display_name(), format!("shell command: {}", shell.command));
            }
            Action::Call(call) => {
                scope.apply_inputs(call.inputs.as_ref())?;
                if let Some(target) = scope.lookup_call(call).await? {
                    plan_node(scope, &target, report).await?;
                }
            }
            Action::Group(group) => {
                scope.apply_inputs(group.inputs.as_ref())?;
                for child in scope.ordered_children(group) {
                    plan_node(scope, child, &mut *report).await?;
                }
            }
        }
        Ok(())
    })
}

fn record(report: &mut PlanReport, step: u64, sub_step: usize, action: &str, line: String) {
    let entry = PlanEntry {
        step,
        sub_step,
        action: action.to_string(),
        line,
    };
    info!(step, sub_step, action = %entry.action, "{}", entry.line);
    report.entries.push(entry);
}
