//! Configuration module
//!
//! Handles loading and managing configuration. Values are resolved as
//! CLI flag > environment variable > config file > default.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{find_config_file, load_config};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Worker processes (None or 0 = all available cores)
    pub jobs: Option<usize>,

    /// Default output format
    pub format: String,

    /// Verbosity (0: warnings only, 1: basic, 2: extended)
    pub verbose: u8,

    /// External programs exposed as functions
    pub commands: Vec<CommandSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            format: "table".to_string(),
            verbose: 1,
            commands: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.verbose > 2 {
            anyhow::bail!("Invalid verbose level {}. Valid values: 0, 1, 2", self.verbose);
        }

        for (i, spec) in self.commands.iter().enumerate() {
            if spec.name.trim().is_empty() {
                anyhow::bail!("Command #{} has an empty name", i + 1);
            }
            if spec.program.trim().is_empty() {
                anyhow::bail!("Command '{}' has an empty program", spec.name);
            }
            if self.commands[..i].iter().any(|c| c.name == spec.name) {
                anyhow::bail!("Command '{}' is declared twice", spec.name);
            }
        }

        Ok(())
    }

    /// Apply environment overrides
    pub fn merge_env(mut self, env: &EnvConfig) -> Self {
        if let Some(jobs) = env.jobs {
            self.jobs = Some(jobs);
        }
        if let Some(format) = &env.format {
            self.format = format.clone();
        }
        if let Some(verbose) = env.verbose {
            self.verbose = verbose;
        }
        self
    }
}

/// An external program registered as a function
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Function name used with `--function`
    pub name: String,

    /// Program to execute
    pub program: String,

    /// Arguments placed before the run parameters; `{subject}` is replaced
    /// by the subject path
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl CommandSpec {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            description: None,
        }
    }
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.jobs, None);
        assert_eq!(config.format, "table");
        assert_eq!(config.verbose, 1);
    }

    #[test]
    fn test_load_yaml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            "jobs: 4\ncommands:\n  - name: sct_propseg\n    program: sct_propseg\n    args: [\"-i\", \"{subject}/t2/t2.nii.gz\"]\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.format, "table");
        assert_eq!(config.commands.len(), 1);
        assert_eq!(config.commands[0].args.len(), 2);
    }

    #[test]
    fn test_load_json_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = AppConfig::default();
        config.verbose = 2;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_duplicate_command() {
        let mut config = AppConfig::default();
        config.commands.push(CommandSpec::new("a", "prog"));
        config.commands.push(CommandSpec::new("a", "other"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_verbose() {
        let config = AppConfig {
            verbose: 3,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_env() {
        let env = EnvConfig {
            jobs: Some(8),
            format: Some("csv".to_string()),
            ..EnvConfig::default()
        };
        let config = AppConfig::default().merge_env(&env);
        assert_eq!(config.jobs, Some(8));
        assert_eq!(config.format, "csv");
        assert_eq!(config.verbose, 1);
    }
}
