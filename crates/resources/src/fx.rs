//! The `fx` solution provider: top-level lifecycle operations composed from
//! the resource providers.

use anyhow::Context;
use async_trait::async_trait;
use fxflow_engine::{
    ActionContext, ActionProvider, FunctionBody, InputBag, Question, Validation,
    model::{Action, CallAction, FunctionAction, GroupAction, InputTemplate},
};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    hosting::HostingKind,
    solution::{active_plugins, mock_function, new_project_settings},
    teams_manifest::CAPABILITY_QUESTION,
};

pub const CONFIG_FOLDER: &str = ".fx";
pub const APP_NAME_QUESTION: &str = "fx.app-name";
/// Environment used when the context does not name one.
pub const DEFAULT_ENV: &str = "dev";

/// Solution-level operations.
pub struct FxProvider;

#[async_trait]
impl ActionProvider for FxProvider {
    fn methods(&self) -> &[&'static str] {
        &[
            "init",
            "create",
            "add",
            "persistBicep",
            "preProvision",
            "deployBicep",
            "provision",
            "build",
            "deploy",
        ]
    }

    async fn get_action(&self, method: &str, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Option<Action>> {
        let action = match method {
            "init" => init(),
            "create" => GroupAction::sequential(vec![
                CallAction::required("fx.init").into(),
                CallAction::required("fx.add").into(),
            ])
            .named("fx.create")
            .into(),
            "add" => add(inputs),
            "persistBicep" => FunctionAction::new("fx.persistBicep", PersistBicep).into(),
            "preProvision" => pre_provision(context),
            "deployBicep" => deploy_bicep(),
            "provision" => provision(context),
            "build" => build(context),
            "deploy" => deploy(context),
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}

fn init() -> Action {
    GroupAction::sequential(vec![
        FunctionAction::new("fx.initConfig", InitConfig).into(),
        CallAction::required("teams-manifest.init").into(),
    ])
    .named("fx.init")
    .into()
}

/// Adds every resource listed in `inputs.resources` and persists the Bicep.
fn add(inputs: &InputBag) -> Action {
    let resources: Vec<String> = match inputs.get("resources") {
        Some(Value::Array(items)) => items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect(),
        Some(Value::String(single)) => vec![single],
        _ => Vec::new(),
    };
    debug!(resources = ?resources, "synthesizing fx.add");

    let mut actions: Vec<Action> = Vec::with_capacity(resources.len() * 4 + 1);
    for resource in &resources {
        for method in ["addInstance", "generateCode", "generateBicep"] {
            actions.push(CallAction::optional(format!("{resource}.{method}")).into());
        }
        if let Some(capability) = capability_for(resource) {
            let mut inputs = InputTemplate::new();
            inputs.insert(CAPABILITY_QUESTION.to_string(), json!([capability]));
            actions.push(CallAction::required("teams-manifest.addCapability").with_inputs(inputs).into());
        }
    }
    actions.push(CallAction::required("fx.persistBicep").into());
    GroupAction::sequential(actions).named("fx.add").into()
}

/// Teams capability a resource brings into the manifest.
fn capability_for(resource: &str) -> Option<&'static str> {
    match resource {
        "nodejs-bot" | "nodejs-notification-bot" => Some("Bot"),
        "azure-storage" => Some("staticTab"),
        _ => None,
    }
}

fn pre_provision(context: &ActionContext) -> Action {
    let env = context.env_name.clone().unwrap_or_else(|| DEFAULT_ENV.to_string());
    mock_function(
        "fx.preProvision",
        format!("check common configs (account, resource group) for env '{env}'"),
        json!({
            "solution.envName": env,
            "solution.tenantId": "MockTenantId",
            "solution.subscriptionId": "MockSubscriptionId",
            "solution.resourceGroup": "MockResourceGroup"
        }),
    )
}

fn deploy_bicep() -> Action {
    FunctionAction::inline("fx.deployBicep", "deploy bicep", |context: &ActionContext, inputs: &InputBag| {
        let mut endpoints = serde_json::Map::new();
        for plugin in active_plugins(context) {
            if let Some(kind) = HostingKind::from_provider_name(&plugin) {
                inputs.set(&format!("{plugin}.endpoint"), kind.mock_endpoint());
                endpoints.insert(plugin, Value::from(kind.mock_endpoint()));
            }
        }
        info!(resources = endpoints.len(), "deployed bicep");
        Ok(Value::Object(endpoints))
    })
    .into()
}

/// Provision sequence: common configs, resource provisioning in parallel, the
/// Bicep deployment, the bot registration, configuration in parallel, then
/// the Teams manifest.
fn provision(context: &ActionContext) -> Action {
    let plugins = active_plugins(context);
    let wiring = Wiring::new(&plugins);

    let provision_calls: Vec<Action> = plugins
        .iter()
        .filter(|plugin| plugin.as_str() != "azure-bot")
        .map(|plugin| CallAction::optional(format!("{plugin}.provision")).into())
        .collect();
    let configure_calls: Vec<Action> = plugins
        .iter()
        .map(|plugin| CallAction::optional(format!("{plugin}.configure")).into())
        .collect();

    let mut sequence: Vec<Action> = vec![
        CallAction::optional("fx.preProvision").into(),
        GroupAction::parallel(provision_calls).named("resources.provision").into(),
        CallAction::required("fx.deployBicep").into(),
    ];
    if wiring.bot {
        sequence.push(CallAction::optional("azure-bot.provision").into());
    }
    let mut configure = GroupAction::parallel(configure_calls).named("resources.configure");
    let configure_inputs = wiring.configure_inputs();
    if !configure_inputs.is_empty() {
        configure = configure.with_inputs(configure_inputs);
    }
    sequence.push(configure.into());
    sequence.push(
        CallAction::required("teams-manifest.provision")
            .with_inputs(wiring.manifest_inputs())
            .into(),
    );

    GroupAction::sequential(sequence).named("fx.provision").into()
}

/// Which parts of a Teams app the project has, derived from its active plugins.
///
/// Templates only reference outputs of resources that are present, so no
/// placeholder is left unresolved after provisioning.
struct Wiring {
    tab: bool,
    bot: bool,
    aad: bool,
    bot_host: Option<HostingKind>,
}

impl Wiring {
    fn new(plugins: &[String]) -> Self {
        let active = |name: &str| plugins.iter().any(|plugin| plugin == name);
        Self {
            tab: active(HostingKind::Storage.provider_name()),
            bot: active("azure-bot"),
            aad: active("aad"),
            bot_host: [HostingKind::WebApp, HostingKind::Function]
                .into_iter()
                .find(|kind| active(kind.provider_name())),
        }
    }

    fn application_id_uri(&self) -> Option<&'static str> {
        match (self.tab, self.bot) {
            (true, true) => Some("api://{{tab.endpoint}}/botid-{{azure-bot.botId}}"),
            (true, false) => Some("api://{{tab.endpoint}}"),
            (false, true) => Some("api://botid-{{azure-bot.botId}}"),
            (false, false) => None,
        }
    }

    fn configure_inputs(&self) -> InputTemplate {
        let mut inputs = InputTemplate::new();
        if self.tab {
            inputs.insert("tab".to_string(), json!({ "endpoint": "{{azure-storage.endpoint}}" }));
        }
        let bot_host = self.bot_host.filter(|_| self.bot);
        if let Some(host) = bot_host {
            inputs.insert("bot".to_string(), json!({ "endpoint": format!("{{{{{}.endpoint}}}}", host.provider_name()) }));
        }
        let uri = self.application_id_uri().filter(|_| self.aad);
        if let Some(uri) = uri {
            inputs.insert("aad".to_string(), json!({ "m365ApplicationIdUri": uri }));
        }

        let mut app_settings = InputTemplate::new();
        if self.bot {
            app_settings.insert("BOT_ID".to_string(), json!("{{azure-bot.botId}}"));
            app_settings.insert("BOT_PASSWORD".to_string(), json!("{{azure-bot.botPassword}}"));
        }
        if uri.is_some() {
            for (key, path) in [
                ("M365_AUTHORITY_HOST", "aad.authAuthorityHost"),
                ("M365_CLIENT_ID", "aad.clientId"),
                ("M365_CLIENT_SECRET", "aad.clientSecret"),
                ("M365_TENANT_ID", "aad.tenantId"),
                ("M365_APPLICATION_ID_URI", "aad.m365ApplicationIdUri"),
            ] {
                app_settings.insert(key.to_string(), Value::from(format!("{{{{{path}}}}}")));
            }
        }
        if let Some(host) = bot_host
            && !app_settings.is_empty()
        {
            inputs.insert(host.provider_name().to_string(), json!({ "appSettings": app_settings }));
        }
        inputs
    }

    fn manifest_inputs(&self) -> InputTemplate {
        let mut manifest = InputTemplate::new();
        if self.tab {
            manifest.insert("tabEndpoint".to_string(), json!("{{azure-storage.endpoint}}"));
        }
        if self.bot {
            manifest.insert("botId".to_string(), json!("{{azure-bot.botId}}"));
        }
        let mut inputs = InputTemplate::new();
        inputs.insert("teams-manifest".to_string(), Value::Object(manifest));
        inputs
    }
}

fn hosting_plugins(context: &ActionContext) -> Vec<HostingKind> {
    active_plugins(context)
        .iter()
        .filter_map(|plugin| HostingKind::from_provider_name(plugin))
        .collect()
}

fn build(context: &ActionContext) -> Action {
    let calls: Vec<Action> = hosting_plugins(context)
        .into_iter()
        .map(|kind| CallAction::optional(format!("{}.build", kind.provider_name())).into())
        .collect();
    GroupAction::parallel(calls).named("fx.build").into()
}

fn deploy(context: &ActionContext) -> Action {
    let mut actions: Vec<Action> = vec![CallAction::optional("fx.build").into()];
    for kind in hosting_plugins(context) {
        let name = kind.provider_name();
        let mut inputs = InputTemplate::new();
        inputs.insert(name.to_string(), json!({ "folder": kind.default_folder() }));
        actions.push(CallAction::optional(format!("{name}.deploy")).with_inputs(inputs).into());
    }
    GroupAction::sequential(actions).named("fx.deploy").into()
}

/// Creates the project settings and configuration folders.
struct InitConfig;

#[async_trait]
impl FunctionBody for InitConfig {
    async fn plan(&self, context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        let Some(root) = context.project_path() else {
            return Ok(vec!["create project settings in memory".to_string()]);
        };
        let config = root.join(CONFIG_FOLDER);
        Ok(vec![
            format!("ensure folder: {}", root.display()),
            format!("ensure folder: {}", config.display()),
            format!("ensure folder: {}", config.join("configs").display()),
            format!("create file: {}", config.join("configs").join("projectSettings.json").display()),
        ])
    }

    async fn question(&self, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Question>> {
        Ok(Some(Question::new(APP_NAME_QUESTION, "Application name").with_validation(Validation {
            min_length: Some(2),
            max_length: Some(30),
            options: None,
        })))
    }

    async fn execute(&self, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Value> {
        let app_name = inputs
            .get_str(APP_NAME_QUESTION)
            .with_context(|| format!("'{APP_NAME_QUESTION}' is not set"))?;
        let settings = new_project_settings(&app_name);
        context.project_setting.replace(settings.clone());

        if let Some(root) = context.project_path() {
            let configs = root.join(CONFIG_FOLDER).join("configs");
            tokio::fs::create_dir_all(&configs)
                .await
                .with_context(|| format!("failed to create {}", configs.display()))?;
            let path = configs.join("projectSettings.json");
            tokio::fs::write(&path, serde_json::to_vec_pretty(&settings)?)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote project settings");
        }
        Ok(settings)
    }
}

/// Writes the accumulated Bicep modules next to the project settings.
struct PersistBicep;

#[async_trait]
impl FunctionBody for PersistBicep {
    async fn plan(&self, context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        let modules = context.bicep.get().as_object().map_or(0, |map| map.len());
        Ok(vec![format!("persist bicep files ({modules} modules known so far)")])
    }

    async fn execute(&self, context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Value> {
        let bicep = context.bicep.get();
        let Some(root) = context.project_path() else {
            info!("no project path, bicep kept in memory");
            return Ok(bicep);
        };
        let folder = root.join(CONFIG_FOLDER).join("bicep");
        tokio::fs::create_dir_all(&folder)
            .await
            .with_context(|| format!("failed to create {}", folder.display()))?;
        let path = folder.join("main.json");
        tokio::fs::write(&path, serde_json::to_vec_pretty(&bicep)?)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "persisted bicep");
        Ok(bicep)
    }
}
