//! Built-in resource providers for fxflow.
//!
//! The providers mirror the resources a Teams app is usually made of (AAD app,
//! static storage, web app, function app, bot registration, Teams manifest)
//! plus the `fx` solution provider that composes them into lifecycle
//! operations. Cloud calls are mocked: bodies write plausible values into the
//! input bag so the engine can be driven end to end.

use std::sync::Arc;

use fxflow_engine::{ActionRegistry, EngineResult};

pub mod aad;
pub mod azure_bot;
pub mod bots;
pub mod fx;
pub mod hosting;
pub mod solution;
pub mod teams_manifest;

use aad::AadProvider;
use azure_bot::AzureBotProvider;
use bots::BotScaffoldProvider;
use fx::FxProvider;
use hosting::{HostingKind, HostingProvider};
use teams_manifest::TeamsManifestProvider;

/// Registers every built-in provider into `registry`.
pub fn register_builtin(registry: &mut ActionRegistry) -> EngineResult<()> {
    registry.register("fx", Arc::new(FxProvider))?;
    registry.register("aad", Arc::new(AadProvider))?;
    for kind in HostingKind::ALL {
        registry.register(kind.provider_name(), Arc::new(HostingProvider::new(kind)))?;
    }
    registry.register("azure-bot", Arc::new(AzureBotProvider))?;
    registry.register("nodejs-bot", Arc::new(BotScaffoldProvider::nodejs_bot()))?;
    registry.register("nodejs-notification-bot", Arc::new(BotScaffoldProvider::notification_bot()))?;
    registry.register("teams-manifest", Arc::new(TeamsManifestProvider))?;
    Ok(())
}

/// A registry holding only the built-in providers.
pub fn builtin_registry() -> EngineResult<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}
