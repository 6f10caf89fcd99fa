//! Runner error types
//!
//! Every failure path of a run maps to one variant, and every variant maps
//! to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for configuration errors (bad dataset, unknown function)
pub const EXIT_CONFIG: i32 = 1;

/// Exit code when a job failed and the run was abandoned
pub const EXIT_JOB_FAILED: i32 = 2;

/// Exit code when the run was interrupted by a stop signal
pub const EXIT_INTERRUPTED: i32 = 130;

/// Result alias used by the runner core
pub type Result<T> = std::result::Result<T, RunnerError>;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Dataset directory not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error(
        "No subject data were found in {}. Please organize your data correctly or provide a correct dataset.",
        .0.display()
    )]
    NoSubjects(PathBuf),

    #[error("Unknown function '{0}' (run `subject-runner list` to see registered functions)")]
    UnknownFunction(String),

    #[error("Function failed on subject {subject}: {message}")]
    Execution { subject: String, message: String },

    #[error("Worker for subject {subject} failed: {message}")]
    Worker { subject: String, message: String },

    #[error("Interrupted, all workers terminated")]
    Interrupted,

    #[error("Got {results} results for {subjects} subjects")]
    ResultMismatch { results: usize, subjects: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunnerError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::DatasetNotFound(_)
            | RunnerError::NoSubjects(_)
            | RunnerError::UnknownFunction(_) => EXIT_CONFIG,
            RunnerError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_JOB_FAILED,
        }
    }

    /// Whether the error happened before any job was dispatched
    pub fn is_configuration(&self) -> bool {
        self.exit_code() == EXIT_CONFIG
    }
}
