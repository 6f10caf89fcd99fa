//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "SUBJECT_RUNNER";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Worker count from SUBJECT_RUNNER_JOBS
    pub jobs: Option<usize>,
    /// Output format from SUBJECT_RUNNER_FORMAT
    pub format: Option<String>,
    /// Verbosity from SUBJECT_RUNNER_VERBOSE
    pub verbose: Option<u8>,
    /// Config file from SUBJECT_RUNNER_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            jobs: get_env_parse("JOBS"),
            format: get_env("FORMAT"),
            verbose: get_env_parse("VERBOSE"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.jobs.is_some()
            || self.format.is_some()
            || self.verbose.is_some()
            || self.config_file.is_some()
    }
}

/// Full variable name for a key
pub fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}_{key}")
}

fn get_env(key: &str) -> Option<String> {
    env::var(env_var_name(key)).ok().filter(|v| !v.is_empty())
}

fn get_env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env(key).and_then(|v| v.parse().ok())
}

/// Print help for environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!("  {ENV_PREFIX}_JOBS      Number of worker processes (0 = all cores)");
    println!("  {ENV_PREFIX}_FORMAT    Output format (table, json, json-pretty, csv, summary)");
    println!("  {ENV_PREFIX}_VERBOSE   Verbosity (0, 1, 2)");
    println!("  {ENV_PREFIX}_CONFIG    Path to configuration file");
}
