//! Hosting resources: static storage for tabs, web apps and function apps.
//!
//! They share one provider parameterized by [`HostingKind`]. None of them has
//! a `provision` method; their infrastructure is created by the Bicep
//! deployment, which is why optional `provision` calls to them are skipped.

use std::path::PathBuf;

use async_trait::async_trait;
use fxflow_engine::{
    ActionContext, ActionProvider, InputBag,
    model::{Action, FunctionAction, GroupAction, ShellAction},
};
use serde_json::{Value, json};
use tracing::info;

use crate::solution::add_instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingKind {
    Storage,
    WebApp,
    Function,
}

impl HostingKind {
    pub const ALL: [HostingKind; 3] = [HostingKind::Storage, HostingKind::WebApp, HostingKind::Function];

    pub fn provider_name(self) -> &'static str {
        match self {
            HostingKind::Storage => "azure-storage",
            HostingKind::WebApp => "azure-web-app",
            HostingKind::Function => "azure-function",
        }
    }

    /// Source folder relative to the project root.
    pub fn default_folder(self) -> &'static str {
        match self {
            HostingKind::Storage => "tabs",
            HostingKind::WebApp => "bot",
            HostingKind::Function => "api",
        }
    }

    /// Endpoint reported by the mock Bicep deployment.
    pub fn mock_endpoint(self) -> &'static str {
        match self {
            HostingKind::Storage => "https://mockstorage.z13.web.core.windows.net",
            HostingKind::WebApp => "https://mockwebapp.azurewebsites.net",
            HostingKind::Function => "https://mockfunction.azurewebsites.net",
        }
    }

    pub fn from_provider_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.provider_name() == name)
    }

    fn activation(self) -> &'static [&'static str] {
        match self {
            HostingKind::Storage => &["azure-storage"],
            HostingKind::WebApp => &["azure-web-app"],
            HostingKind::Function => &["azure-function"],
        }
    }
}

pub struct HostingProvider {
    kind: HostingKind,
}

impl HostingProvider {
    pub fn new(kind: HostingKind) -> Self {
        Self { kind }
    }

    fn generate_bicep(&self) -> Action {
        let name = self.kind.provider_name();
        FunctionAction::inline(
            format!("{name}.generateBicep"),
            format!("create {name} bicep"),
            move |context: &ActionContext, _inputs: &InputBag| {
                let module = json!({
                    "module": format!("./modules/{name}.bicep"),
                    "outputs": ["endpoint", "resourceId"]
                });
                context.bicep.update(|bicep| {
                    if !bicep.is_object() {
                        *bicep = json!({});
                    }
                    bicep[name] = module.clone();
                });
                Ok(module)
            },
        )
        .into()
    }

    fn configure(&self) -> Action {
        let name = self.kind.provider_name();
        let plan = match self.kind {
            HostingKind::Storage => "configure azure storage (enable static web site)".to_string(),
            _ => format!("configure {name} app settings"),
        };
        FunctionAction::inline(format!("{name}.configure"), plan, move |_context: &ActionContext, inputs: &InputBag| {
            let settings = inputs.get(&format!("{name}.appSettings")).unwrap_or(Value::Null);
            let count = settings.as_object().map_or(0, |map| map.len());
            info!(resource = name, app_settings = count, "configured hosting resource");
            Ok(json!({ "appSettings": count }))
        })
        .into()
    }

    fn build(&self, context: &ActionContext) -> Action {
        let name = self.kind.provider_name();
        let folder = self.kind.default_folder();
        let mut shell = ShellAction::new("npm install && npm run build", format!("build {folder} for {name}")).named(format!("{name}.build"));
        if let Some(cwd) = project_dir(context, folder) {
            shell = shell.in_dir(cwd);
        }
        shell.into()
    }

    fn deploy(&self, context: &ActionContext, inputs: &InputBag) -> Action {
        let name = self.kind.provider_name();
        let folder = inputs
            .get_str(&format!("{name}.folder"))
            .unwrap_or_else(|| self.kind.default_folder().to_string());

        if self.kind == HostingKind::Storage {
            let mut upload = ShellAction::new(
                format!("az storage blob upload-batch --destination '$web' --source {folder}/build"),
                format!("upload {folder}/build to the static website"),
            )
            .named(format!("{name}.deploy"));
            if let Some(root) = context.project_path() {
                upload = upload.in_dir(root);
            }
            return upload.into();
        }

        let mut package = ShellAction::new(format!("zip -r ../{name}.zip ."), format!("package {folder}"));
        if let Some(cwd) = project_dir(context, &folder) {
            package = package.in_dir(cwd);
        }
        let zip_deploy = FunctionAction::inline(
            format!("{name}.zipDeploy"),
            format!("zip deploy {folder} to {name}"),
            move |_context: &ActionContext, inputs: &InputBag| {
                let endpoint = inputs.get_str(&format!("{name}.endpoint")).unwrap_or_default();
                inputs.set(&format!("{name}.lastDeployedFolder"), folder.clone());
                info!(resource = name, endpoint = %endpoint, "zip deployed package");
                Ok(json!({ "endpoint": endpoint }))
            },
        );
        GroupAction::sequential(vec![package.into(), zip_deploy.into()])
            .named(format!("{name}.deploy"))
            .into()
    }
}

fn project_dir(context: &ActionContext, folder: &str) -> Option<PathBuf> {
    context.project_path().map(|root| root.join(folder))
}

#[async_trait]
impl ActionProvider for HostingProvider {
    fn methods(&self) -> &[&'static str] {
        &["addInstance", "generateBicep", "configure", "build", "deploy"]
    }

    async fn get_action(&self, method: &str, context: &ActionContext, inputs: &InputBag) -> anyhow::Result<Option<Action>> {
        let action = match method {
            "addInstance" => add_instance(self.kind.provider_name(), self.kind.activation()),
            "generateBicep" => self.generate_bicep(),
            "configure" => self.configure(),
            "build" => self.build(context),
            "deploy" => self.deploy(context, inputs),
            _ => return Ok(None),
        };
        Ok(Some(action))
    }
}
