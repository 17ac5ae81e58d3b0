//! Configuration file loading and validation.

use std::path::{Component, Path};

use crate::error::ConfigError;
use crate::types::ProjectConfig;

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE: &str = "stabil.toml";

/// Loads and validates `stabil.toml` from a project directory.
///
/// Fails if the file is missing, unreadable, or invalid.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(CONFIG_FILE))?;
    load_config_from_str(&content)
}

/// Like [`load_config`], but an absent file yields the default configuration.
pub fn load_config_or_default(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    match std::fs::read_to_string(project_dir.join(CONFIG_FILE)) {
        Ok(content) => load_config_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectConfig::default()),
        Err(e) => Err(e.into()),
    }
}

/// Parses and validates a `stabil.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.data.environment.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "data.environment must not be empty".to_string(),
        ));
    }
    if config.data.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "data.path must not be empty".to_string(),
        ));
    }
    for dir in &config.tracking.dirs {
        if dir.is_absolute() || dir.components().any(|c| c == Component::ParentDir) {
            return Err(ConfigError::ValidationError(format!(
                "tracking dir '{}' must be relative to the project root",
                dir.display()
            )));
        }
    }
    Ok(())
}
