use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fxflow_engine::{ActionContext, Engine, EngineConfig, InputBag, Lookup, ShellMode, model::Action};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Resolve, plan and execute fxflow actions.
#[derive(Parser, Debug)]
#[command(name = "fxflow", version, about)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Input value as KEY=VALUE; KEY may be a dotted path and VALUE is parsed as JSON when possible
    #[arg(short = 'i', long = "input", value_name = "KEY=VALUE", global = true)]
    inputs: Vec<String>,

    /// YAML or JSON object merged into the inputs before `--input` values
    #[arg(long, global = true)]
    inputs_file: Option<PathBuf>,

    /// YAML or JSON project settings document
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Project root directory
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Target environment name
    #[arg(long, global = true)]
    env: Option<String>,

    /// Print the input bag once the command finishes
    #[arg(long, global = true)]
    show_inputs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered providers and their methods
    List,
    /// Print the resolved action tree as JSON
    Resolve { action: String },
    /// Print the numbered plan without running anything
    Plan { action: String },
    /// Execute an action
    Execute {
        action: String,
        /// Print the plan before executing
        #[arg(long)]
        plan_first: bool,
        /// Spawn shell commands instead of describing them
        #[arg(long)]
        run_shell: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Command::Execute { run_shell: true, .. } = cli.command {
        config.shell = ShellMode::Process;
    }
    let engine = Engine::with_config(fxflow_resources::builtin_registry()?, config);

    let context = build_context(&cli)?;
    let inputs = build_inputs(&cli)?;
    debug!(inputs = inputs.snapshot().len(), "inputs loaded");

    match &cli.command {
        Command::List => list(&engine),
        Command::Resolve { action } => {
            let action = synthesize(&engine, action, &context, &inputs).await?;
            let resolved = engine.resolve_action(action, &context, &inputs).await?;
            println!("{}", serde_json::to_string_pretty(&resolved.to_json())?);
        }
        Command::Plan { action } => {
            let action = synthesize(&engine, action, &context, &inputs).await?;
            print_plan(&engine, &action, &context, &inputs).await?;
        }
        Command::Execute { action, plan_first, .. } => {
            let action = synthesize(&engine, action, &context, &inputs).await?;
            if *plan_first {
                // Planning advances the step counter, so it runs on a copy.
                print_plan(&engine, &action, &context, &inputs.deep_clone()).await?;
            }
            let report = engine.execute_action(&action, &context, &inputs).await?;
            for step in &report.steps {
                println!("step [{}]: [{}] {}", step.step, step.action, step.output);
            }
            info!(steps = report.steps.len(), final_step = report.final_step, "execution finished");
        }
    }

    if cli.show_inputs {
        println!("{}", serde_json::to_string_pretty(&inputs.to_value())?);
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn list(engine: &Engine) {
    let registry = engine.registry();
    for provider in registry.providers() {
        let methods = registry.methods(provider).unwrap_or_default();
        println!("{provider}: {}", methods.join(", "));
    }
}

async fn synthesize(engine: &Engine, name: &str, context: &ActionContext, inputs: &InputBag) -> Result<Action> {
    match engine.get_action(name, context, inputs).await? {
        Lookup::Found(action) => Ok(action),
        Lookup::Empty => bail!("'{name}' has nothing to do for this project"),
        Lookup::NotFound => bail!("action '{name}' not found; run `fxflow list` for the available actions"),
    }
}

async fn print_plan(engine: &Engine, action: &Action, context: &ActionContext, inputs: &InputBag) -> Result<()> {
    let report = engine.plan_action(action, context, inputs).await?;
    for line in report.lines() {
        println!("{line}");
    }
    Ok(())
}

fn build_context(cli: &Cli) -> Result<ActionContext> {
    let mut context = ActionContext::new();
    if let Some(project) = &cli.project {
        context = context.with_project_path(project);
    }
    if let Some(env) = &cli.env {
        context = context.with_env_name(env);
    }
    if let Some(path) = &cli.settings {
        context = context.with_project_setting(read_document(path)?);
    }
    Ok(context)
}

fn build_inputs(cli: &Cli) -> Result<InputBag> {
    let inputs = match &cli.inputs_file {
        Some(path) => match read_document(path)? {
            Value::Object(map) => InputBag::from_map(map),
            Value::Null => InputBag::new(),
            _ => bail!("{} must contain a mapping", path.display()),
        },
        None => InputBag::new(),
    };
    for raw in &cli.inputs {
        let (key, value) = parse_input(raw)?;
        inputs.set(&key, value);
    }
    Ok(inputs)
}

/// Splits `KEY=VALUE`, reading VALUE as JSON and falling back to a string.
fn parse_input(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("input '{raw}' must look like KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("input '{raw}' has an empty key");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Reads a YAML document; JSON files parse as well.
fn read_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}
