use async_trait::async_trait;
use fxflow_engine::{
    ActionContext, ActionProvider, FunctionBody, InputBag, Question, Validation,
    model::{Action, FunctionAction},
};
use serde_json::{Value, json};
use tracing::info;

use crate::solution::{add_capabilities, mock_function};

pub const CAPABILITY_QUESTION: &str = "add-capability";
pub const CAPABILITY_OPTIONS: [&str; 4] = ["Bot", "staticTab", "configurableTab", "MessageExtension"];

/// Teams app manifest.
pub struct TeamsManifestProvider;

#[async_trait]
impl ActionProvider for TeamsManifestProvider {
    fn methods(&self) -> &[&'static str] {
        &["init", "addCapability", "provision"]
    }

    async fn get_action(&self, method: &str, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Action>> {
        let action = match method {
            "init" => mock_function(
                "teams-manifest.init",
                "init manifest template",
                json!({ "teams-manifest.manifestVersion": "1.13" }),
            ),
            "addCapability" => FunctionAction::new("teams-manifest.addCapability", AddCapability).into(),
            "provision" => FunctionAction::inline(
                "teams-manifest.provision",
                "provision teams manifest",
                |_context: &ActionContext, inputs: &InputBag| {
                    let tab = inputs.get_str("teams-manifest.tabEndpoint").unwrap_or_default();
                    let bot = inputs.get_str("teams-manifest.botId").unwrap_or_default();
                    info!(tab_endpoint = %tab, bot_id = %bot, "provisioned teams manifest");
                    inputs.set("teams-manifest.teamsAppId", "MockTeamsAppId");
                    Ok(json!({ "tabEndpoint": tab, "botId": bot }))
                },
            )
            .into(),
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}

/// Records the selected capabilities in the project settings.
struct AddCapability;

impl AddCapability {
    fn selected(inputs: &InputBag) -> Vec<String> {
        match inputs.get(CAPABILITY_QUESTION) {
            Some(Value::String(single)) => vec![single],
            Some(Value::Array(items)) => items.into_iter().filter_map(|item| item.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl FunctionBody for AddCapability {
    async fn plan(&self, _context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        Ok(vec![format!(
            "add capability in teams manifest: {}",
            Self::selected(inputs).join(", ")
        )])
    }

    async fn question(&self, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Question>> {
        Ok(Some(
            Question::new(CAPABILITY_QUESTION, "Select capabilities")
                .with_validation(Validation::options(CAPABILITY_OPTIONS)),
        ))
    }

    async fn execute(&self, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Value> {
        let selected = Self::selected(inputs);
        let names: Vec<&str> = selected.iter().map(String::as_str).collect();
        add_capabilities(context, &names);
        Ok(json!({ "capabilities": selected }))
    }
}
