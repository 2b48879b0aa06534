use async_trait::async_trait;
use fxflow_engine::{
    ActionContext, ActionProvider, FunctionBody, InputBag,
    model::{Action, FunctionAction},
};
use serde_json::{Value, json};
use tracing::info;

use crate::solution::add_instance;

/// Azure Bot Service registration.
pub struct AzureBotProvider;

#[async_trait]
impl ActionProvider for AzureBotProvider {
    fn methods(&self) -> &[&'static str] {
        &["addInstance", "provision"]
    }

    async fn get_action(&self, method: &str, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Action>> {
        let action = match method {
            "addInstance" => add_instance("azure-bot", &["azure-bot"]),
            "provision" => FunctionAction::new("azure-bot.provision", ProvisionBot).into(),
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}

/// Creates the bot AAD app and bot registration unless a previous run
/// already recorded a bot id.
struct ProvisionBot;

#[async_trait]
impl FunctionBody for ProvisionBot {
    async fn plan(&self, _context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Vec<String>> {
        if let Some(bot_id) = inputs.get_str("azure-bot.botId") {
            return Ok(vec![format!("reuse existing bot registration {bot_id}")]);
        }
        Ok(vec![
            "create AAD app for bot service".to_string(),
            "create azure bot service".to_string(),
        ])
    }

    async fn execute(&self, _context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Value> {
        if let Some(bot_id) = inputs.get_str("azure-bot.botId") {
            info!(bot_id = %bot_id, "bot registration already exists, skipping");
            return Ok(json!({ "botId": bot_id, "created": false }));
        }
        inputs.set("azure-bot.botAadAppClientId", "MockBotAadAppClientId");
        inputs.set("azure-bot.botId", "MockBotId");
        inputs.set("azure-bot.botPassword", "MockBotPassword");
        info!(bot_id = "MockBotId", "created bot registration");
        Ok(json!({ "botId": "MockBotId", "created": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provision_is_idempotent() {
        let context = ActionContext::new();
        let inputs = InputBag::new();

        let first = ProvisionBot.execute(&context, &inputs).await.expect("first run");
        assert_eq!(first["created"], true);
        inputs.set("azure-bot.botPassword", "rotated");

        let second = ProvisionBot.execute(&context, &inputs).await.expect("second run");
        assert_eq!(second, json!({"botId": "MockBotId", "created": false}));
        assert_eq!(inputs.get_str("azure-bot.botPassword").as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn plan_mentions_reuse_when_bot_exists() {
        let inputs = InputBag::from_value(json!({"azure-bot": {"botId": "existing"}}));
        let lines = ProvisionBot.plan(&ActionContext::new(), &inputs).await.expect("plan");
        assert_eq!(lines, vec!["reuse existing bot registration existing".to_string()]);
    }
}
