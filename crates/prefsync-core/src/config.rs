use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::record::DEFAULT_MAX_RETRIES;

/// Labeler every client consults, whatever the account has configured.
pub const DEFAULT_APP_LABELER: &str = "did:plc:ar7c4by46qjdydhdevvrndac";

const APP_LABELERS_ENV: &str = "PREFSYNC_APP_LABELERS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_app_labelers")]
    pub app_labelers: Vec<String>,
    #[serde(default = "default_record_max_retries")]
    pub record_max_retries: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_labelers: default_app_labelers(),
            record_max_retries: default_record_max_retries(),
        }
    }
}

/// Load an agent config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_agent_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        return Ok(AgentConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<AgentConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `prefsync/config.toml` from the user config directory.
///
/// # Errors
///
/// As [`load_agent_config`].
pub fn load_user_agent_config() -> Result<AgentConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(AgentConfig::default());
    };
    load_agent_config(&config_dir.join("prefsync/config.toml"))
}

/// Config from `path` (or the user config directory), then the environment.
///
/// # Errors
///
/// As [`load_agent_config`].
pub fn resolve_agent_config(path: Option<&Path>) -> Result<AgentConfig> {
    let config = match path {
        Some(path) => load_agent_config(path)?,
        None => load_user_agent_config()?,
    };
    Ok(apply_env_overrides(config, env::var(APP_LABELERS_ENV).ok()))
}

fn apply_env_overrides(mut config: AgentConfig, app_labelers: Option<String>) -> AgentConfig {
    if let Some(raw) = app_labelers {
        config.app_labelers = raw
            .split(',')
            .map(str::trim)
            .filter(|did| !did.is_empty())
            .map(str::to_string)
            .collect();
    }
    config
}

fn default_app_labelers() -> Vec<String> {
    vec![DEFAULT_APP_LABELER.to_string()]
}

const fn default_record_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
