use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::bail;
use async_trait::async_trait;
use fxflow_engine::{
    ActionContext, ActionPriority, ActionProvider, ActionRegistry, Engine, EngineConfig, EngineError, FunctionBody, InputBag,
    Question, StepKind, Validation,
    model::{Action, CallAction, FunctionAction, GroupAction, ShellAction, template},
};
use serde_json::{Value, json};

type Factory = Box<dyn Fn() -> Option<Action> + Send + Sync>;

/// Provider whose methods return freshly built actions from closures.
#[derive(Default)]
struct TestProvider {
    methods: Vec<&'static str>,
    factories: HashMap<&'static str, Factory>,
}

impl TestProvider {
    fn with(mut self, method: &'static str, factory: impl Fn() -> Option<Action> + Send + Sync + 'static) -> Self {
        self.methods.push(method);
        self.factories.insert(method, Box::new(factory));
        self
    }
}

#[async_trait]
impl ActionProvider for TestProvider {
    fn methods(&self) -> &[&'static str] {
        &self.methods
    }

    async fn get_action(&self, method: &str, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Action>> {
        match self.factories.get(method) {
            Some(factory) => Ok(factory()),
            None => bail!("no factory for {method}"),
        }
    }
}

/// Function body that sleeps, then records its name under `finished.<name>`.
struct Sleeper {
    name: &'static str,
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl FunctionBody for Sleeper {
    async fn plan(&self, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        Ok(vec![format!("sleep {}ms", self.delay.as_millis())])
    }

    async fn execute(&self, _context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Value> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            bail!("{} failed", self.name);
        }
        inputs.set(&format!("finished.{}", self.name), true);
        Ok(json!({ "slept": self.delay.as_millis() as u64 }))
    }
}

fn sleeper(name: &'static str, millis: u64, fail: bool) -> Action {
    FunctionAction::new(
        name,
        Sleeper {
            name,
            delay: Duration::from_millis(millis),
            fail,
        },
    )
    .into()
}

fn writer(name: &str, key: &'static str, value: Value) -> Action {
    FunctionAction::inline(name, format!("write {key}"), move |_, inputs| {
        inputs.set(key, value.clone());
        Ok(Value::Null)
    })
    .into()
}

fn engine_with(providers: Vec<(&str, TestProvider)>) -> Engine {
    engine_with_config(providers, EngineConfig::default())
}

fn engine_with_config(providers: Vec<(&str, TestProvider)>, config: EngineConfig) -> Engine {
    let mut registry = ActionRegistry::new();
    for (name, provider) in providers {
        registry.register(name, Arc::new(provider)).expect("register provider");
    }
    Engine::with_config(registry, config)
}

fn deployment_engine() -> Engine {
    let bot = TestProvider::default()
        .with("provision", || {
            Some(FunctionAction::inline("bot.provision", "create bot registration", |_, _| Ok(Value::Null)).into())
        })
        .with("configure", || Some(CallAction::required("bot.provision").into()));
    let storage = TestProvider::default().with("provision", || {
        Some(
            GroupAction::sequential(vec![
                writer("storage.create", "storage.endpoint", json!("https://storage")),
                ShellAction::new("az storage blob upload-batch", "upload assets").into(),
            ])
            .named("storage.provision")
            .into(),
        )
    });
    let app = TestProvider::default().with("provision", || {
        Some(
            GroupAction::sequential(vec![
                CallAction::required("storage.provision")
                    .with_inputs(template(json!({"storage": {"sku": "Standard_LRS"}})))
                    .into(),
                CallAction::required("bot.configure")
                    .with_inputs(template(json!({"bot": {"endpoint": "{{storage.endpoint}}"}})))
                    .into(),
                CallAction::optional("aad.provision").into(),
            ])
            .named("app.provision")
            .into(),
        )
    });
    engine_with(vec![("bot", bot), ("storage", storage), ("app", app)])
}

async fn top_level(engine: &Engine, name: &str, context: &ActionContext, inputs: &InputBag) -> Action {
    engine
        .get_action(name, context, inputs)
        .await
        .expect("lookup")
        .into_action()
        .expect("action synthesized")
}

#[tokio::test]
async fn resolve_inlines_groups_and_keeps_function_calls() {
    let engine = deployment_engine();
    let context = ActionContext::new();
    let inputs = InputBag::new();
    let action = top_level(&engine, "app.provision", &context, &inputs).await;

    let resolved = engine.resolve_action(action, &context, &inputs).await.expect("resolve");
    let json = resolved.to_json();

    assert_eq!(json["actions"][0]["type"], "group");
    assert_eq!(json["actions"][0]["name"], "storage.provision");
    assert_eq!(json["actions"][0]["inputs"], json!({"storage": {"sku": "Standard_LRS"}}));

    // bot.configure is a call chain ending at a function: the inner call is spliced
    // and wrapped so the declared inputs stay attached.
    assert_eq!(json["actions"][1]["type"], "group");
    assert_eq!(json["actions"][1]["actions"][0]["type"], "call");
    assert_eq!(json["actions"][1]["actions"][0]["targetAction"], "bot.provision");
    assert_eq!(json["actions"][1]["inputs"]["bot"]["endpoint"], "{{storage.endpoint}}");

    assert_eq!(json["actions"][2]["type"], "call");
    assert_eq!(json["actions"][2]["targetAction"], "aad.provision");
}

#[tokio::test]
async fn resolve_is_idempotent() {
    let engine = deployment_engine();
    let context = ActionContext::new();
    let inputs = InputBag::new();
    let action = top_level(&engine, "app.provision", &context, &inputs).await;

    let once = engine.resolve_action(action, &context, &inputs).await.expect("first resolve");
    let twice = engine.resolve_action(once.clone(), &context, &inputs).await.expect("second resolve");

    assert_eq!(once.to_json(), twice.to_json());
}

#[tokio::test]
async fn plan_numbers_steps_monotonically_and_runs_no_bodies() {
    let executed = Arc::new(AtomicUsize::new(0));
    let counter = executed.clone();
    let provider = TestProvider::default().with("counted", move || {
        let counter = counter.clone();
        Some(
            FunctionAction::inline("demo.counted", "count an execution", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
            .into(),
        )
    });
    let engine = engine_with(vec![("demo", provider)]);
    let action: Action = GroupAction::parallel(vec![
        CallAction::required("demo.counted").into(),
        ShellAction::new("npm run build", "build").into(),
        GroupAction::sequential(vec![CallAction::required("demo.counted").into()]).into(),
    ])
    .into();

    let report = engine
        .plan_action(&action, &ActionContext::new(), &InputBag::new())
        .await
        .expect("plan");
    assert_eq!(report.steps(), vec![1, 2, 3]);
    assert_eq!(report.entries[1].to_string(), "plan [2.1]: [build] - shell command: npm run build");
    assert_eq!(executed.load(Ordering::SeqCst), 0);

    let seeded = InputBag::from_value(json!({"step": 10}));
    let report = engine.plan_action(&action, &ActionContext::new(), &seeded).await.expect("plan");
    assert_eq!(report.steps(), vec![10, 11, 12]);
    assert_eq!(seeded.get("step"), Some(json!(13)));
}

#[tokio::test]
async fn execute_numbers_steps_from_seed() {
    let engine = engine_with(vec![]);
    let action: Action = GroupAction::sequential(vec![
        writer("first", "demo.first", json!(1)),
        ShellAction::new("echo hi", "greet").into(),
        writer("second", "demo.second", json!(2)),
    ])
    .into();
    let inputs = InputBag::from_value(json!({"step": 4}));

    let report = engine
        .execute_action(&action, &ActionContext::new(), &inputs)
        .await
        .expect("execute");

    let steps: Vec<u64> = report.steps.iter().map(|step| step.step).collect();
    assert_eq!(steps, vec![4, 5, 6]);
    assert_eq!(report.final_step, 7);
    assert_eq!(report.steps[1].kind, StepKind::Shell);
    assert_eq!(report.steps[1].output, json!({"command": "echo hi"}));
}

#[tokio::test]
async fn sequential_children_observe_earlier_writes() {
    let engine = engine_with(vec![]);
    let action: Action = GroupAction::sequential(vec![
        writer("f1", "seq.a", json!(1)),
        FunctionAction::inline("f2", "derive b", |_, inputs| {
            let a = inputs.get("seq.a").and_then(|value| value.as_i64()).unwrap_or_default();
            inputs.set("seq.b", a + 1);
            Ok(Value::Null)
        })
        .into(),
        FunctionAction::inline("f3", "derive c", |_, inputs| {
            let b = inputs.get("seq.b").and_then(|value| value.as_i64()).unwrap_or_default();
            inputs.set("seq.c", b * 10);
            Ok(Value::Null)
        })
        .into(),
    ])
    .into();
    let inputs = InputBag::new();

    engine
        .execute_action(&action, &ActionContext::new(), &inputs)
        .await
        .expect("execute");

    assert_eq!(inputs.get("seq"), Some(json!({"a": 1, "b": 2, "c": 20})));
}

#[tokio::test]
async fn group_inputs_pipe_values_between_siblings() {
    let provider = TestProvider::default().with("configure", || {
        Some(
            FunctionAction::inline("bot.configure", "configure bot endpoint", |_, inputs| {
                let endpoint = inputs.get_str("bot.endpoint").unwrap_or_default();
                inputs.set("bot.configured", endpoint.clone());
                Ok(json!({ "endpoint": endpoint }))
            })
            .into(),
        )
    });
    let engine = engine_with(vec![("bot", provider)]);
    let action: Action = GroupAction::sequential(vec![
        writer("web.provision", "web.endpoint", json!("https://web.example")),
        CallAction::required("bot.configure")
            .with_inputs(template(json!({"bot": {"endpoint": "{{web.endpoint}}/api/messages"}})))
            .into(),
    ])
    .into();
    let inputs = InputBag::new();

    engine
        .execute_action(&action, &ActionContext::new(), &inputs)
        .await
        .expect("execute");

    assert_eq!(
        inputs.get_str("bot.configured").as_deref(),
        Some("https://web.example/api/messages")
    );
}

#[tokio::test]
async fn missing_required_call_is_fatal_and_optional_is_skipped() {
    let engine = engine_with(vec![]);
    let context = ActionContext::new();
    let required: Action = GroupAction::sequential(vec![CallAction::required("missing.thing").into()]).into();
    let optional: Action = GroupAction::sequential(vec![CallAction::optional("missing.thing").into()]).into();

    let error = engine
        .plan_action(&required, &context, &InputBag::new())
        .await
        .expect_err("plan fails");
    assert!(error.to_string().contains("missing.thing"), "unexpected error: {error}");

    let error = engine
        .execute_action(&required, &context, &InputBag::new())
        .await
        .expect_err("execute fails");
    assert!(matches!(error, EngineError::ActionNotFound { ref name } if name == "missing.thing"));

    assert!(engine.plan_action(&optional, &context, &InputBag::new()).await.is_ok());
    let report = engine
        .execute_action(&optional, &context, &InputBag::new())
        .await
        .expect("optional call skipped");
    assert!(report.steps.is_empty());
}

#[tokio::test]
async fn empty_target_is_skipped_even_when_required() {
    let provider = TestProvider::default().with("noop", || None);
    let engine = engine_with(vec![("idle", provider)]);
    let action: Action = CallAction::required("idle.noop").into();

    let report = engine
        .execute_action(&action, &ActionContext::new(), &InputBag::new())
        .await
        .expect("empty target is not an error");
    assert!(report.steps.is_empty());
}

#[tokio::test]
async fn malformed_call_target_aborts_the_walk() {
    let engine = engine_with(vec![]);
    let action: Action = CallAction::optional("nodot").into();
    let error = engine
        .plan_action(&action, &ActionContext::new(), &InputBag::new())
        .await
        .expect_err("malformed name");
    assert!(matches!(error, EngineError::InvalidActionName { .. }));
}

#[tokio::test]
async fn parallel_group_waits_for_every_child() {
    let engine = engine_with(vec![]);
    let action: Action = GroupAction::parallel(vec![sleeper("slow", 100, false), sleeper("fast", 1, false)]).into();
    let inputs = InputBag::new();

    let report = engine
        .execute_action(&action, &ActionContext::new(), &inputs)
        .await
        .expect("execute");

    assert!(inputs.contains("finished.slow"));
    assert!(inputs.contains("finished.fast"));
    let completion_order: Vec<&str> = report.steps.iter().map(|step| step.action.as_str()).collect();
    assert_eq!(completion_order, vec!["fast", "slow"]);
    let mut steps: Vec<u64> = report.steps.iter().map(|step| step.step).collect();
    steps.sort_unstable();
    assert_eq!(steps, vec![1, 2]);
}

#[tokio::test]
async fn parallel_failure_lets_siblings_finish() {
    let engine = engine_with(vec![]);
    let action: Action = GroupAction::parallel(vec![sleeper("broken", 1, true), sleeper("steady", 50, false)]).into();
    let inputs = InputBag::new();

    let error = engine
        .execute_action(&action, &ActionContext::new(), &inputs)
        .await
        .expect_err("one child fails");

    assert!(matches!(error, EngineError::Body { ref action, .. } if action == "broken"));
    assert!(inputs.contains("finished.steady"));
}

#[tokio::test]
async fn execute_failure_aborts_remaining_siblings() {
    let engine = engine_with(vec![]);
    let action: Action = GroupAction::sequential(vec![
        writer("before", "run.before", json!(true)),
        sleeper("broken", 0, true),
        writer("after", "run.after", json!(true)),
    ])
    .into();
    let inputs = InputBag::new();

    let error = engine
        .execute_action(&action, &ActionContext::new(), &inputs)
        .await
        .expect_err("aborted");

    assert!(matches!(error, EngineError::Body { .. }));
    assert!(inputs.contains("run.before"));
    assert!(!inputs.contains("run.after"));
}

#[tokio::test]
async fn priority_orders_sequential_children_only_when_enabled() {
    let action: Action = GroupAction::sequential(vec![
        FunctionAction::inline("late", "late", |_, _| Ok(Value::Null))
            .with_priority(ActionPriority::P5)
            .into(),
        FunctionAction::inline("early", "early", |_, _| Ok(Value::Null))
            .with_priority(ActionPriority::P0)
            .into(),
        FunctionAction::inline("middle", "middle", |_, _| Ok(Value::Null)).into(),
    ])
    .into();
    let names = |report: fxflow_engine::ExecutionReport| -> Vec<String> { report.steps.into_iter().map(|step| step.action).collect() };

    let default_engine = engine_with(vec![]);
    let report = default_engine
        .execute_action(&action, &ActionContext::new(), &InputBag::new())
        .await
        .expect("execute");
    assert_eq!(names(report), vec!["late", "early", "middle"]);

    let config = EngineConfig {
        honor_priority: true,
        ..EngineConfig::default()
    };
    let ordered_engine = engine_with_config(vec![], config);
    let report = ordered_engine
        .execute_action(&action, &ActionContext::new(), &InputBag::new())
        .await
        .expect("execute");
    assert_eq!(names(report), vec!["early", "middle", "late"]);
}

struct NamedApp;

#[async_trait]
impl FunctionBody for NamedApp {
    async fn plan(&self, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        Ok(vec!["scaffold the app".to_string()])
    }

    async fn question(&self, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Question>> {
        Ok(Some(Question::new("fx.app-name", "Application name").with_validation(Validation {
            min_length: Some(2),
            max_length: Some(30),
            options: None,
        })))
    }

    async fn execute(&self, _context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Value> {
        inputs.set("fx.created", true);
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn invalid_answer_blocks_function_execution() {
    let engine = engine_with(vec![]);
    let action: Action = FunctionAction::new("fx.create", NamedApp).into();

    let missing = InputBag::new();
    let error = engine
        .execute_action(&action, &ActionContext::new(), &missing)
        .await
        .expect_err("no answer");
    assert!(matches!(error, EngineError::Validation { ref question, .. } if question == "fx.app-name"));
    assert!(!missing.contains("fx.created"));

    let answered = InputBag::from_value(json!({"fx": {"app-name": "contoso"}}));
    engine
        .execute_action(&action, &ActionContext::new(), &answered)
        .await
        .expect("valid answer");
    assert!(answered.contains("fx.created"));
}

#[tokio::test]
async fn template_cycle_surfaces_as_error() {
    let config = EngineConfig {
        max_template_passes: 4,
        ..EngineConfig::default()
    };
    let engine = engine_with_config(vec![], config);
    let action: Action = GroupAction::sequential(vec![])
        .with_inputs(template(json!({"a": "{{b}}!"})))
        .into();
    let inputs = InputBag::from_value(json!({"b": "{{a}}"}));

    let error = engine
        .execute_action(&action, &ActionContext::new(), &inputs)
        .await
        .expect_err("cycle");
    assert!(matches!(error, EngineError::TemplateCycle { passes: 4, .. }));
}
