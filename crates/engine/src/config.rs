//! Engine configuration loaded from YAML.
//!
//! Lookup order: an explicit path, then `FXFLOW_CONFIG`, then
//! `<config_dir>/fxflow/config.yaml`. A missing default file yields the
//! defaults; a missing explicit file is an error. `FXFLOW_MAX_TEMPLATE_PASSES`
//! overrides the pass bound after the file is read.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

pub const CONFIG_PATH_ENV: &str = "FXFLOW_CONFIG";
pub const MAX_TEMPLATE_PASSES_ENV: &str = "FXFLOW_MAX_TEMPLATE_PASSES";
pub const DEFAULT_MAX_TEMPLATE_PASSES: usize = 16;

/// How shell actions are handled during execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellMode {
    /// Log the command without spawning anything.
    #[default]
    Describe,
    /// Spawn the command through the platform shell.
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound on template propagation passes per node.
    pub max_template_passes: usize,
    /// Visit sequential-group children in ascending priority order.
    pub honor_priority: bool,
    pub shell: ShellMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_template_passes: DEFAULT_MAX_TEMPLATE_PASSES,
            honor_priority: false,
            shell: ShellMode::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(content: &str) -> EngineResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content).map_err(|error| EngineError::Config(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|error| EngineError::Config(format!("cannot read {}: {error}", path.display())))?;
        Self::from_yaml_str(&content).map_err(|error| match error {
            EngineError::Config(message) => EngineError::Config(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// Loads configuration from `explicit`, or from the default location.
    pub fn load(explicit: Option<&Path>) -> EngineResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    debug!(path = %path.display(), "no engine config found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> EngineResult<()> {
        if let Ok(raw) = env::var(MAX_TEMPLATE_PASSES_ENV)
            && !raw.trim().is_empty()
        {
            self.max_template_passes = raw
                .trim()
                .parse()
                .map_err(|_| EngineError::Config(format!("{MAX_TEMPLATE_PASSES_ENV} must be a positive integer, got '{raw}'")))?;
        }
        Ok(())
    }

    fn validate(&self) -> EngineResult<()> {
        if self.max_template_passes == 0 {
            return Err(EngineError::Config("max_template_passes must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Get the default path for the engine configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fxflow")
        .join("config.yaml")
}
