//! External program functions
//!
//! Wraps a command-line tool (e.g. a segmentation program) so it can be run
//! on every subject. The program runs inside the subject folder. Lines of
//! the form `METRIC key=value` on its stdout become metrics columns.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use super::{JobContext, SubjectTest};
use crate::config::CommandSpec;
use crate::models::{JobResult, MetricsTable};
use crate::utils::timer::Timer;

const METRIC_PREFIX: &str = "METRIC ";
const SUBJECT_PLACEHOLDER: &str = "{subject}";

/// Function backed by an external program
pub struct CommandTest {
    spec: CommandSpec,
}

impl CommandTest {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    /// Arguments for one subject: configured args, then the parameters
    fn build_args(&self, subject: &Path, parameters: &str) -> Vec<String> {
        let subject = subject.to_string_lossy();
        self.spec
            .args
            .iter()
            .map(String::as_str)
            .chain(parameters.split_whitespace())
            .map(|arg| arg.replace(SUBJECT_PLACEHOLDER, &subject))
            .collect()
    }
}

impl SubjectTest for CommandTest {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        self.spec
            .description
            .as_deref()
            .unwrap_or("External program")
    }

    fn run(&self, subject: &Path, parameters: &str, ctx: &JobContext) -> Result<JobResult> {
        let args = self.build_args(subject, parameters);
        debug!("{} {}", self.spec.program, args.join(" "));

        let timer = Timer::start(format!("{} on {}", self.spec.name, subject.display()));
        let mut command = Command::new(&self.spec.program);
        command
            .args(&args)
            .current_dir(subject)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let output = ctx
            .output(&mut command)
            .with_context(|| format!("Failed to run {}", self.spec.program))?;
        let duration_ms = timer.elapsed_ms();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let status = output.status.code().unwrap_or(-1);

        let mut cells: Vec<(String, Value)> = vec![
            ("exit_code".to_string(), status.into()),
            ("duration_ms".to_string(), duration_ms.into()),
        ];
        cells.extend(parse_metrics(&stdout));

        let mut text = stdout.into_owned();
        text.push_str(&stderr);

        Ok(JobResult::new(status, text, MetricsTable::single_row(cells)))
    }
}

/// Extract `METRIC key=value` lines
fn parse_metrics(stdout: &str) -> Vec<(String, Value)> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix(METRIC_PREFIX))
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), parse_value(v.trim())))
        .collect()
}

fn parse_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return n.into();
    }
    if let Ok(x) = raw.parse::<f64>() {
        if x.is_finite() {
            return x.into();
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
