//! Worker process protocol
//!
//! A worker receives one job as plain command-line data, runs it, and
//! prints exactly one JSON reply as the last line of its stdout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::error::RunnerError;
use crate::functions::{JobContext, Registry};
use crate::models::JobResult;

/// One job, as received by a worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerRequest {
    pub function: String,
    pub subject: PathBuf,
    pub parameters: String,
    pub threads: usize,
}

/// Why a worker could not produce a result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownFunction,
    Execution,
}

/// Reply written by a worker on stdout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerReply {
    Done(JobResult),
    Failed { kind: FailureKind, message: String },
}

impl WorkerReply {
    /// Worker process exit code for this reply
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerReply::Done(_) => 0,
            WorkerReply::Failed { .. } => 1,
        }
    }

    /// Parse the reply from a worker's stdout (last non-empty line)
    pub fn parse(stdout: &str) -> Option<Self> {
        let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
        serde_json::from_str(line).ok()
    }

    /// Turn the reply into the job outcome seen by the dispatcher
    pub fn into_result(self, function: &str, subject: &str) -> Result<JobResult, RunnerError> {
        match self {
            WorkerReply::Done(result) if result.metrics.is_well_formed() => Ok(result),
            WorkerReply::Done(_) => Err(RunnerError::Worker {
                subject: subject.to_string(),
                message: "malformed metrics table".to_string(),
            }),
            WorkerReply::Failed {
                kind: FailureKind::UnknownFunction,
                ..
            } => Err(RunnerError::UnknownFunction(function.to_string())),
            WorkerReply::Failed { message, .. } => Err(RunnerError::Execution {
                subject: subject.to_string(),
                message,
            }),
        }
    }
}

/// Run one job inside a worker
pub fn execute(registry: &Registry, request: &WorkerRequest) -> WorkerReply {
    let function = match registry.resolve(&request.function) {
        Ok(f) => f,
        Err(e) => {
            return WorkerReply::Failed {
                kind: FailureKind::UnknownFunction,
                message: e.to_string(),
            }
        }
    };

    debug!(
        "Worker {} running {} on {}",
        std::process::id(),
        request.function,
        request.subject.display()
    );

    let ctx = JobContext::new(request.threads);
    match function.run(&request.subject, &request.parameters, &ctx) {
        Ok(result) => WorkerReply::Done(result),
        Err(e) => WorkerReply::Failed {
            kind: FailureKind::Execution,
            message: format!("{e:#}"),
        },
    }
}
