use std::sync::{Mutex, PoisonError};

use futures_util::future::{BoxFuture, join_all};
use tracing::{error, info};

use crate::{
    error::{EngineError, EngineResult},
    model::{Action, GroupMode},
};

use super::{ExecutedStep, Scope, StepKind};

/// Collects executed steps in completion order across parallel branches.
#[derive(Debug, Default)]
pub(crate) struct StepRecorder {
    steps: Mutex<Vec<ExecutedStep>>,
}

impl StepRecorder {
    fn push(&self, step: ExecutedStep) {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner).push(step);
    }

    pub(crate) fn into_steps(self) -> Vec<ExecutedStep> {
        self.steps.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Real walk. A failing node aborts the rest of the tree; nothing already
/// done is rolled back.
pub(crate) fn execute_node<'a>(scope: Scope<'a>, action: &'a Action, recorder: &'a StepRecorder) -> BoxFuture<'a, EngineResult<()>> {
    Box::pin(async move {
        match action {
            Action::Function(function) => {
                let step = scope.inputs.next_step();
                let body_error = |source| EngineError::Body {
                    action: function.name.clone(),
                    source,
                };
                let question = function.body().question(scope.context, scope.inputs).await.map_err(body_error)?;
                if let Some(question) = question {
                    question
                        .validate(scope.inputs)
                        .map_err(|message| EngineError::Validation {
                            question: question.name.clone(),
                            message,
                        })?;
                }
                let output = function.body().execute(scope.context, scope.inputs).await.map_err(body_error)?;
                info!(step, action = %function.name, "executed function");
                recorder.push(ExecutedStep {
                    step,
                    action: function.name.clone(),
                    kind: StepKind::Function,
                    output,
                });
            }
            Action::Shell(shell) => {
                let step = scope.inputs.next_step();
                let output = scope
                    .engine
                    .shell_runner()
                    .run(shell, scope.context)
                    .await
                    .map_err(|source| EngineError::Shell {
                        command: shell.command.clone(),
                        source,
                    })?;
                info!(step, command = %shell.command, "executed shell action");
                recorder.push(ExecutedStep {
                    step,
                    action: action.display_name(),
                    kind: StepKind::Shell,
                    output,
                });
            }
            Action::Call(call) => {
                scope.apply_inputs(call.inputs.as_ref())?;
                if let Some(target) = scope.lookup_call(call).await? {
                    execute_node(scope, &target, recorder).await?;
                }
            }
            Action::Group(group) => {
                scope.apply_inputs(group.inputs.as_ref())?;
                match group.mode {
                    GroupMode::Sequential => {
                        for child in scope.ordered_children(group) {
                            execute_node(scope, child, recorder).await?;
                        }
                    }
                    GroupMode::Parallel => {
                        let results = join_all(group.actions.iter().map(|child| execute_node(scope, child, recorder))).await;
                        let mut first_error = None;
                        for (child, result) in group.actions.iter().zip(results) {
                            let Err(failure) = result else {
                                continue;
                            };
                            if first_error.is_none() {
                                first_error = Some(failure);
                            } else {
                                error!(action = %child.display_name(), error = %failure, "parallel sibling failed");
                            }
                        }
                        if let Some(failure) = first_error {
                            return Err(failure);
                        }
                    }
                }
            }
        }
        Ok(())
    })
}
