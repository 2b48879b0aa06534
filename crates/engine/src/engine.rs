use std::{fmt, sync::Arc};

use tracing::{debug, info};

use crate::{
    config::{EngineConfig, ShellMode},
    context::ActionContext,
    error::EngineResult,
    executor::{
        DescribeShellRunner, ExecutionReport, PlanReport, ProcessShellRunner, Scope, ShellRunner, execute::StepRecorder,
        execute::execute_node, plan::plan_node, resolve::resolve_node,
    },
    inputs::InputBag,
    model::Action,
    registry::{ActionRegistry, Lookup},
};

/// Facade owning the registry, configuration and shell runner.
///
/// These four methods are the whole public surface callers need:
/// [`get_action`](Self::get_action), [`resolve_action`](Self::resolve_action),
/// [`plan_action`](Self::plan_action) and [`execute_action`](Self::execute_action).
#[derive(Clone)]
pub struct Engine {
    registry: Arc<ActionRegistry>,
    config: EngineConfig,
    shell_runner: Arc<dyn ShellRunner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new(registry: ActionRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    /// Creates an engine whose shell runner follows `config.shell`.
    pub fn with_config(registry: ActionRegistry, config: EngineConfig) -> Self {
        let shell_runner: Arc<dyn ShellRunner> = match config.shell {
            ShellMode::Describe => Arc::new(DescribeShellRunner),
            ShellMode::Process => Arc::new(ProcessShellRunner),
        };
        Self {
            registry: Arc::new(registry),
            config,
            shell_runner,
        }
    }

    pub fn with_shell_runner(mut self, shell_runner: Arc<dyn ShellRunner>) -> Self {
        self.shell_runner = shell_runner;
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shell_runner(&self) -> &dyn ShellRunner {
        self.shell_runner.as_ref()
    }

    /// Asks the registry to synthesize the named action.
    pub async fn get_action(&self, name: &str, context: &ActionContext, inputs: &InputBag) -> EngineResult<Lookup> {
        self.registry.lookup(name, context, inputs).await
    }

    /// Inlines call targets that are not leaf functions, propagating templates on the way.
    ///
    /// Resolving an already resolved tree yields the same tree.
    pub async fn resolve_action(&self, action: Action, context: &ActionContext, inputs: &InputBag) -> EngineResult<Action> {
        debug!(action = %action.display_name(), "resolving action");
        resolve_node(Scope::new(self, context, inputs), action).await
    }

    /// Describes what executing `action` would do without running any body.
    pub async fn plan_action(&self, action: &Action, context: &ActionContext, inputs: &InputBag) -> EngineResult<PlanReport> {
        let first_step = inputs.ensure_step();
        debug!(action = %action.display_name(), first_step, "planning action");
        let mut report = PlanReport::default();
        plan_node(Scope::new(self, context, inputs), action, &mut report).await?;
        Ok(report)
    }

    /// Runs `action`. The first failure aborts the walk.
    pub async fn execute_action(&self, action: &Action, context: &ActionContext, inputs: &InputBag) -> EngineResult<ExecutionReport> {
        let first_step = inputs.ensure_step();
        info!(action = %action.display_name(), first_step, "executing action");
        let recorder = StepRecorder::default();
        execute_node(Scope::new(self, context, inputs), action, &recorder).await?;
        Ok(ExecutionReport {
            steps: recorder.into_steps(),
            final_step: inputs.ensure_step(),
        })
    }
}
