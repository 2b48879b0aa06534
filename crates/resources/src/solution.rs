//! Project-settings helpers shared by the built-in providers.
//!
//! Providers keep their state in the context's project settings document,
//! under `solutionSettings`. The engine never looks inside it.

use fxflow_engine::{
    ActionContext, InputBag,
    model::{Action, FunctionAction},
};
use serde_json::{Map as JsonMap, Value, json};
use tracing::info;

const PLUGINS_POINTER: &str = "/solutionSettings/activeResourcePlugins";
const CAPABILITIES_POINTER: &str = "/solutionSettings/capabilities";

/// Plugins enabled for the project, in the order they were added.
pub fn active_plugins(context: &ActionContext) -> Vec<String> {
    string_list(&context.project_setting.get(), PLUGINS_POINTER)
}

/// Capabilities recorded in the Teams manifest section of the settings.
pub fn capabilities(context: &ActionContext) -> Vec<String> {
    string_list(&context.project_setting.get(), CAPABILITIES_POINTER)
}

fn string_list(settings: &Value, pointer: &str) -> Vec<String> {
    settings
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Adds each plugin to `activeResourcePlugins` unless it is already present.
pub fn activate_plugins(context: &ActionContext, plugins: &[&str]) {
    context
        .project_setting
        .update(|settings| push_unique(settings, "activeResourcePlugins", plugins));
}

/// Adds each capability to `solutionSettings.capabilities` unless present.
pub fn add_capabilities(context: &ActionContext, names: &[&str]) {
    context
        .project_setting
        .update(|settings| push_unique(settings, "capabilities", names));
}

fn push_unique(settings: &mut Value, key: &str, names: &[&str]) {
    if !settings.is_object() {
        *settings = Value::Object(JsonMap::new());
    }
    let solution = &mut settings["solutionSettings"];
    if !solution.is_object() {
        *solution = json!({ "name": "fx" });
    }
    let list = &mut solution[key];
    if !list.is_array() {
        *list = Value::Array(Vec::new());
    }
    if let Value::Array(items) = list {
        for name in names {
            if !items.iter().any(|item| item.as_str() == Some(*name)) {
                items.push(Value::from(*name));
            }
        }
    }
}

/// Fresh settings document for a newly initialized project.
pub fn new_project_settings(app_name: &str) -> Value {
    json!({
        "appName": app_name,
        "solutionSettings": {
            "name": "fx",
            "activeResourcePlugins": [],
            "capabilities": []
        }
    })
}

/// A function action that writes fixed values into the bag.
///
/// `writes` maps dotted paths to values; every entry is written on execute.
pub fn mock_function(name: &str, plan: impl Into<String>, writes: Value) -> Action {
    let action_name = name.to_string();
    FunctionAction::inline(name, plan, move |_context: &ActionContext, inputs: &InputBag| {
        if let Value::Object(entries) = &writes {
            for (path, value) in entries {
                inputs.set(path, value.clone());
            }
        }
        info!(action = %action_name, keys = writes.as_object().map_or(0, JsonMap::len), "mock outputs written");
        Ok(writes.clone())
    })
    .into()
}

/// A function action that enables plugins in the project settings.
pub fn add_instance(provider: &'static str, plugins: &'static [&'static str]) -> Action {
    FunctionAction::inline(
        format!("{provider}.addInstance"),
        format!("ensure entries {plugins:?} in projectSettings.solutionSettings.activeResourcePlugins"),
        move |context: &ActionContext, _inputs: &InputBag| {
            activate_plugins(context, plugins);
            Ok(json!({ "activated": plugins }))
        },
    )
    .into()
}
