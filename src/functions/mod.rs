//! Registry of functions that can be run on a subject
//!
//! Functions are registered by name at startup. A run looks its function up
//! once before dispatch, and each worker looks it up again by the same name.

mod command;
mod inventory;

pub use command::CommandTest;
pub use inventory::InventoryTest;

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{Result, RunnerError};
use crate::models::JobResult;
use crate::utils::process::ChildGroups;

/// Environment variables that cap the threads of imaging libraries
const THREAD_ENV_VARS: &[&str] = &[
    "ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS",
    "OMP_NUM_THREADS",
    "MKL_NUM_THREADS",
];

/// Execution settings handed to every job
#[derive(Clone, Debug, Default)]
pub struct JobContext {
    /// Threads a single job may use internally (0 = library default)
    pub threads: usize,
    /// Set when the job runs in this process; its programs are killed with it
    groups: Option<ChildGroups>,
}

impl JobContext {
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            groups: None,
        }
    }

    /// One thread per job, used when a worker pool provides the parallelism
    pub fn single_threaded() -> Self {
        Self::new(1)
    }

    /// Track the programs this job starts in `groups`
    pub fn with_groups(mut self, groups: ChildGroups) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Environment to export into programs started by a job
    pub fn thread_env(&self) -> Vec<(&'static str, String)> {
        if self.threads == 0 {
            return Vec::new();
        }
        THREAD_ENV_VARS
            .iter()
            .map(|var| (*var, self.threads.to_string()))
            .collect()
    }

    /// Run a program for this job and wait for it
    ///
    /// The thread limit is exported into its environment. In a worker the
    /// program joins the worker's process group; in process it gets a group
    /// of its own that dies when the job is cancelled.
    pub fn output(&self, command: &mut Command) -> io::Result<Output> {
        command.envs(self.thread_env());
        match &self.groups {
            Some(groups) => groups.output(command),
            None => command.output(),
        }
    }
}

/// A function that can be tested on one subject
pub trait SubjectTest: Send + Sync {
    /// Name used to select the function
    fn name(&self) -> &str;

    /// One-line description for `list`
    fn description(&self) -> &str;

    /// Run on one subject folder
    fn run(&self, subject: &Path, parameters: &str, ctx: &JobContext)
        -> anyhow::Result<JobResult>;
}

/// Name -> function mapping
#[derive(Clone, Default)]
pub struct Registry {
    functions: BTreeMap<String, Arc<dyn SubjectTest>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in functions only
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(InventoryTest);
        registry
    }

    /// Built-in functions plus the command functions declared in config
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::with_builtins();
        for spec in &config.commands {
            debug!("Registering command function {} -> {}", spec.name, spec.program);
            registry.register(CommandTest::new(spec.clone()));
        }
        registry
    }

    /// Register a function, replacing any previous one with the same name
    pub fn register(&mut self, function: impl SubjectTest + 'static) {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn SubjectTest>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| RunnerError::UnknownFunction(name.to_string()))
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SubjectTest>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }
}
