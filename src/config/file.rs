//! Configuration file discovery
//!
//! Handles finding and loading configuration files.

use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

use super::{AppConfig, EnvConfig};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./subject-runner.yaml",
    "./subject-runner.yml",
    "./subject-runner.json",
    "~/.config/subject-runner/config.yaml",
];

/// Locate the configuration file
///
/// An explicit path (CLI, then environment) wins over the standard
/// locations. Explicit paths are returned even if they do not exist so the
/// load reports the error.
pub fn find_config_file(explicit: Option<&str>, env: &EnvConfig) -> Option<PathBuf> {
    if let Some(path) = explicit.or(env.config_file.as_deref()) {
        return Some(expand_path(path));
    }

    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load configuration and apply environment overrides
pub fn load_config(explicit: Option<&str>, env: &EnvConfig) -> Result<AppConfig> {
    let config = match find_config_file(explicit, env) {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            AppConfig::load(&path)?
        }
        None => AppConfig::default(),
    };

    let config = config.merge_env(env);
    config.validate()?;
    Ok(config)
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
