use anyhow::Context;
use async_trait::async_trait;
use fxflow_engine::{
    ActionContext, ActionProvider, FunctionBody, InputBag,
    model::{Action, CallAction, FunctionAction},
};
use serde_json::{Value, json};
use tracing::info;

use crate::hosting::HostingKind;

/// Bot scaffolds. Each one is hosted on a hosting resource and registered
/// with Azure Bot Service.
pub struct BotScaffoldProvider {
    name: &'static str,
    description: &'static str,
    hosting: HostingKind,
}

impl BotScaffoldProvider {
    pub fn nodejs_bot() -> Self {
        Self {
            name: "nodejs-bot",
            description: "nodejs bot",
            hosting: HostingKind::WebApp,
        }
    }

    pub fn notification_bot() -> Self {
        Self {
            name: "nodejs-notification-bot",
            description: "nodejs notification bot",
            hosting: HostingKind::Function,
        }
    }

    fn add_instance(&self) -> Action {
        let hosting = self.hosting.provider_name();
        FunctionAction::inline(
            format!("{}.addInstance", self.name),
            format!("ensure entries '{hosting}', 'azure-bot' in projectSettings.solutionSettings.activeResourcePlugins"),
            move |context: &ActionContext, _inputs: &InputBag| {
                crate::solution::activate_plugins(context, &[hosting, "azure-bot"]);
                Ok(json!({ "activated": [hosting, "azure-bot"] }))
            },
        )
        .into()
    }
}

#[async_trait]
impl ActionProvider for BotScaffoldProvider {
    fn methods(&self) -> &[&'static str] {
        &["addInstance", "generateCode", "generateBicep"]
    }

    async fn get_action(&self, method: &str, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Action>> {
        let action = match method {
            "addInstance" => self.add_instance(),
            "generateCode" => FunctionAction::new(
                format!("{}.generateCode", self.name),
                ScaffoldCode {
                    description: self.description,
                    folder: self.hosting.default_folder(),
                },
            )
            .into(),
            "generateBicep" => CallAction::required(format!("{}.generateBicep", self.hosting.provider_name())).into(),
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}

/// Creates the source folder for a bot inside the project.
struct ScaffoldCode {
    description: &'static str,
    folder: &'static str,
}

#[async_trait]
impl FunctionBody for ScaffoldCode {
    async fn plan(&self, context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        let target = match context.project_path() {
            Some(root) => root.join(self.folder).display().to_string(),
            None => self.folder.to_string(),
        };
        Ok(vec![format!("scaffold {} source code into {target}", self.description)])
    }

    async fn execute(&self, context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Value> {
        let Some(root) = context.project_path() else {
            info!(folder = self.folder, "no project path, skipping scaffold");
            return Ok(Value::Null);
        };
        let target = root.join(self.folder);
        tokio::fs::create_dir_all(&target)
            .await
            .with_context(|| format!("failed to create {}", target.display()))?;
        info!(path = %target.display(), "scaffolded {}", self.description);
        Ok(json!({ "path": target.display().to_string() }))
    }
}
