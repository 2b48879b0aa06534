use fxflow_engine::{ActionContext, Engine, EngineError, InputBag, model::Action};
use fxflow_resources::{
    builtin_registry,
    hosting::HostingKind,
    solution::{active_plugins, capabilities},
};
use serde_json::{Value, json};

fn engine() -> Engine {
    Engine::new(builtin_registry().expect("builtin providers register"))
}

fn deployed_project() -> ActionContext {
    ActionContext::new().with_project_setting(json!({
        "appName": "demo",
        "solutionSettings": {
            "name": "fx",
            "activeResourcePlugins": ["aad", "azure-storage", "azure-web-app", "azure-bot"],
            "capabilities": ["Tab", "Bot"]
        }
    }))
}

async fn synthesize(engine: &Engine, name: &str, context: &ActionContext, inputs: &InputBag) -> Action {
    engine
        .get_action(name, context, inputs)
        .await
        .expect("lookup")
        .into_action()
        .unwrap_or_else(|| panic!("{name} should synthesize an action"))
}

#[tokio::test]
async fn provision_plan_lists_every_leaf_without_running_bodies() {
    let engine = engine();
    let context = deployed_project();
    let inputs = InputBag::new();
    let provision = synthesize(&engine, "fx.provision", &context, &inputs).await;

    let report = engine.plan_action(&provision, &context, &inputs).await.expect("plan");
    let mut actions: Vec<&str> = report.entries.iter().map(|entry| entry.action.as_str()).collect();
    actions.dedup();
    assert_eq!(
        actions,
        vec![
            "fx.preProvision",
            "aad.provision",
            "fx.deployBicep",
            "azure-bot.provision",
            "aad.configure",
            "azure-storage.configure",
            "azure-web-app.configure",
            "teams-manifest.provision",
        ]
    );
    assert_eq!(report.steps(), (1..=8).collect::<Vec<u64>>());
    assert!(!inputs.contains("aad.clientId"));
    assert!(!inputs.contains("azure-bot.botId"));
}

#[tokio::test]
async fn provision_pipes_outputs_through_the_configure_templates() {
    let engine = engine();
    let context = deployed_project();
    let inputs = InputBag::new();
    let provision = synthesize(&engine, "fx.provision", &context, &inputs).await;

    let report = engine.execute_action(&provision, &context, &inputs).await.expect("execute");

    let storage = HostingKind::Storage.mock_endpoint();
    assert_eq!(inputs.get_str("tab.endpoint").as_deref(), Some(storage));
    assert_eq!(
        inputs.get_str("bot.endpoint").as_deref(),
        Some(HostingKind::WebApp.mock_endpoint())
    );
    let application_id_uri = format!("api://{storage}/botid-MockBotId");
    assert_eq!(
        report.step("aad.configure").expect("aad configured").output["m365ApplicationIdUri"],
        Value::from(application_id_uri.clone())
    );
    assert_eq!(
        inputs.get_str("azure-web-app.appSettings.M365_APPLICATION_ID_URI"),
        Some(application_id_uri)
    );
    assert_eq!(
        report.step("azure-web-app.configure").expect("web app configured").output["appSettings"],
        7
    );
    assert_eq!(inputs.get_str("teams-manifest.teamsAppId").as_deref(), Some("MockTeamsAppId"));
    assert_eq!(
        report.step("teams-manifest.provision").expect("manifest provisioned").output["tabEndpoint"],
        storage
    );
    assert_eq!(report.final_step, 9);
    assert_eq!(inputs.get_str("solution.envName").as_deref(), Some("dev"));
}

fn placeholders_in(value: &Value, path: &str, found: &mut Vec<String>) {
    match value {
        Value::String(text) if text.contains("{{") => found.push(format!("{path} = {text}")),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                placeholders_in(item, &format!("{path}[{index}]"), found);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                placeholders_in(item, &format!("{path}.{key}"), found);
            }
        }
        _ => {}
    }
}

#[tokio::test]
async fn bot_only_provision_leaves_no_placeholders_in_the_bag() {
    let engine = engine();
    let context = ActionContext::new().with_env_name("staging").with_project_setting(json!({
        "appName": "bot-only",
        "solutionSettings": {
            "name": "fx",
            "activeResourcePlugins": ["azure-web-app", "azure-bot"],
            "capabilities": ["Bot"]
        }
    }));
    let inputs = InputBag::new();
    let provision = synthesize(&engine, "fx.provision", &context, &inputs).await;

    let report = engine.execute_action(&provision, &context, &inputs).await.expect("execute");

    let mut leftovers = Vec::new();
    placeholders_in(&inputs.to_value(), "", &mut leftovers);
    assert!(leftovers.is_empty(), "unresolved placeholders: {leftovers:?}");

    assert!(!inputs.contains("tab"));
    assert!(!inputs.contains("aad"));
    assert_eq!(
        inputs.get("azure-web-app.appSettings"),
        Some(json!({ "BOT_ID": "MockBotId", "BOT_PASSWORD": "MockBotPassword" }))
    );
    assert_eq!(
        inputs.get_str("bot.endpoint").as_deref(),
        Some(HostingKind::WebApp.mock_endpoint())
    );
    assert_eq!(inputs.get("teams-manifest.tabEndpoint"), None);
    let manifest = &report.step("teams-manifest.provision").expect("manifest provisioned").output;
    assert_eq!(manifest["botId"], "MockBotId");
    assert_eq!(manifest["tabEndpoint"], "");
    assert_eq!(inputs.get_str("solution.envName").as_deref(), Some("staging"));
}

#[tokio::test]
async fn tab_only_provision_derives_the_application_id_uri_from_the_tab() {
    let engine = engine();
    let context = ActionContext::new().with_project_setting(json!({
        "solutionSettings": { "activeResourcePlugins": ["aad", "azure-storage"] }
    }));
    let inputs = InputBag::new();
    let provision = synthesize(&engine, "fx.provision", &context, &inputs).await;

    engine.execute_action(&provision, &context, &inputs).await.expect("execute");

    let mut leftovers = Vec::new();
    placeholders_in(&inputs.to_value(), "", &mut leftovers);
    assert!(leftovers.is_empty(), "unresolved placeholders: {leftovers:?}");
    assert_eq!(
        inputs.get_str("aad.m365ApplicationIdUri"),
        Some(format!("api://{}", HostingKind::Storage.mock_endpoint()))
    );
    assert!(!inputs.contains("bot"));
}

#[tokio::test]
async fn provision_twice_reuses_the_bot_registration() {
    let engine = engine();
    let context = deployed_project();
    let inputs = InputBag::new();
    let provision = synthesize(&engine, "fx.provision", &context, &inputs).await;

    engine.execute_action(&provision, &context, &inputs).await.expect("first run");
    let second = engine.execute_action(&provision, &context, &inputs).await.expect("second run");
    assert_eq!(second.step("azure-bot.provision").expect("bot step").output["created"], false);
}

#[tokio::test]
async fn create_scaffolds_a_project_on_disk() {
    let directory = tempfile::tempdir().expect("temp dir");
    let engine = engine();
    let context = ActionContext::new().with_project_path(directory.path());
    let inputs = InputBag::from_value(json!({
        "fx": { "app-name": "demo-app" },
        "resources": ["aad", "nodejs-bot"]
    }));
    let create = synthesize(&engine, "fx.create", &context, &inputs).await;

    engine.execute_action(&create, &context, &inputs).await.expect("create");

    let settings_file = directory.path().join(".fx").join("configs").join("projectSettings.json");
    let written: Value = serde_json::from_slice(&std::fs::read(&settings_file).expect("settings written")).expect("json");
    assert_eq!(written["appName"], "demo-app");
    assert!(directory.path().join("bot").is_dir());

    let bicep: Value = serde_json::from_slice(
        &std::fs::read(directory.path().join(".fx").join("bicep").join("main.json")).expect("bicep written"),
    )
    .expect("json");
    assert!(bicep.get("azure-web-app").is_some());
    assert_eq!(active_plugins(&context), vec!["aad", "azure-web-app", "azure-bot"]);
    assert_eq!(capabilities(&context), vec!["Bot"]);
    assert_eq!(inputs.get_str("teams-manifest.manifestVersion").as_deref(), Some("1.13"));
}

#[tokio::test]
async fn init_rejects_a_too_short_app_name() {
    let engine = engine();
    let context = ActionContext::new();
    let inputs = InputBag::from_value(json!({ "fx": { "app-name": "x" } }));
    let init = synthesize(&engine, "fx.init", &context, &inputs).await;

    let error = engine.execute_action(&init, &context, &inputs).await.expect_err("validation fails");
    assert!(matches!(error, EngineError::Validation { ref question, .. } if question == "fx.app-name"));
    assert!(!inputs.contains("teams-manifest.manifestVersion"));
}

#[tokio::test]
async fn add_records_the_tab_capability_in_the_manifest() {
    let engine = engine();
    let context = ActionContext::new().with_project_setting(json!({}));
    let inputs = InputBag::from_value(json!({ "resources": ["azure-storage"] }));
    let add = synthesize(&engine, "fx.add", &context, &inputs).await;

    let plan = engine.plan_action(&add, &context, &inputs.deep_clone()).await.expect("plan");
    assert!(plan.entries.iter().any(|entry| entry.action == "teams-manifest.addCapability"));

    engine.execute_action(&add, &context, &inputs).await.expect("add tab");
    assert_eq!(capabilities(&context), vec!["staticTab"]);
    assert_eq!(active_plugins(&context), vec!["azure-storage"]);
}

#[tokio::test]
async fn add_capability_accepts_only_known_options() {
    let engine = engine();
    let context = deployed_project();

    let accepted = InputBag::from_value(json!({ "add-capability": ["Bot", "MessageExtension"] }));
    let action = synthesize(&engine, "teams-manifest.addCapability", &context, &accepted).await;
    engine.execute_action(&action, &context, &accepted).await.expect("known options");
    assert_eq!(capabilities(&context), vec!["Tab", "Bot", "MessageExtension"]);

    let rejected = InputBag::from_value(json!({ "add-capability": "Dashboard" }));
    let error = engine.execute_action(&action, &context, &rejected).await.expect_err("unknown option");
    assert!(matches!(error, EngineError::Validation { .. }));
}

#[tokio::test]
async fn unknown_fx_method_is_not_found() {
    let engine = engine();
    let lookup = engine
        .get_action("fx.publish", &ActionContext::new(), &InputBag::new())
        .await
        .expect("lookup");
    assert!(lookup.into_action().is_none());
}
