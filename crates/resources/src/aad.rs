use async_trait::async_trait;
use fxflow_engine::{
    ActionContext, ActionProvider, InputBag,
    model::{Action, FunctionAction},
};
use serde_json::{Value, json};
use tracing::info;

use crate::solution::{add_instance, mock_function};

/// Azure AD app registration used for single sign-on.
pub struct AadProvider;

#[async_trait]
impl ActionProvider for AadProvider {
    fn methods(&self) -> &[&'static str] {
        &["addInstance", "provision", "configure"]
    }

    async fn get_action(&self, method: &str, _context: &ActionContext, _inputs: &InputBag) -> anyhow::Result<Option<Action>> {
        let action = match method {
            "addInstance" => add_instance("aad", &["aad"]),
            "provision" => mock_function(
                "aad.provision",
                "provision aad app registration",
                json!({
                    "aad.clientId": "mockM365ClientId",
                    "aad.clientSecret": "mockM365ClientSecret",
                    "aad.authAuthorityHost": "https://login.microsoftonline.com",
                    "aad.tenantId": "mockM365TenantId"
                }),
            ),
            "configure" => FunctionAction::inline(
                "aad.configure",
                "configure aad app registration (redirect uris, application id uri)",
                |_context: &ActionContext, inputs: &InputBag| {
                    let uri = inputs.get("aad.m365ApplicationIdUri").unwrap_or(Value::Null);
                    info!(application_id_uri = %uri, "configured aad app registration");
                    Ok(json!({ "m365ApplicationIdUri": uri }))
                },
            )
            .into(),
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}
