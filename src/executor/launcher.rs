//! Job launchers
//!
//! A launcher runs exactly one job and hands back its result or error. The
//! dispatcher decides what to do with failures.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, trace};

use super::worker::WorkerReply;
use crate::error::{Result, RunnerError};
use crate::functions::{JobContext, Registry};
use crate::models::{Job, JobResult};
use crate::utils::process::{ChildGroups, GroupGuard};

/// Runs one job
pub trait Launcher {
    fn launch(&self, job: Job) -> impl Future<Output = Result<JobResult>> + Send;
}

/// Runs jobs on a blocking thread of the controlling process
///
/// Programs a job starts are killed, with their children, if the job is
/// dropped before it finishes.
pub struct InProcessLauncher {
    registry: Arc<Registry>,
    ctx: JobContext,
}

impl InProcessLauncher {
    pub fn new(registry: Arc<Registry>, ctx: JobContext) -> Self {
        Self { registry, ctx }
    }
}

impl Launcher for InProcessLauncher {
    async fn launch(&self, job: Job) -> Result<JobResult> {
        let function = self.registry.resolve(&job.function)?;
        let groups = ChildGroups::new();
        let _cancel = groups.kill_on_drop();
        let ctx = self.ctx.clone().with_groups(groups);
        let subject = job.subject.name.clone();

        let handle = tokio::task::spawn_blocking(move || {
            function.run(&job.subject.path, &job.parameters, &ctx)
        });

        match handle.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(RunnerError::Execution {
                subject,
                message: format!("{e:#}"),
            }),
            Err(e) => Err(RunnerError::Execution {
                subject,
                message: format!("job panicked: {e}"),
            }),
        }
    }
}

/// Runs each job in its own worker process
///
/// The worker is `program` invoked with `base_args` followed by the job as
/// plain arguments. Each worker leads its own process group, so a terminal
/// interrupt only reaches the controlling process. If the job is dropped
/// before it finishes, the whole group is killed.
pub struct ProcessLauncher {
    program: PathBuf,
    base_args: Vec<String>,
    ctx: JobContext,
    extra_args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>, ctx: JobContext) -> Self {
        Self {
            program: program.into(),
            base_args,
            ctx,
            extra_args: Vec::new(),
        }
    }

    /// Launcher re-executing the current binary in worker mode
    pub fn current_exe(ctx: JobContext) -> Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program, vec!["worker".to_string()], ctx))
    }

    /// Extra arguments appended to every worker command line
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn worker_args(&self, job: &Job) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "--function".to_string(),
            job.function.clone(),
            "--subject".to_string(),
            job.subject.path.to_string_lossy().into_owned(),
            format!("--parameters={}", job.parameters),
            "--threads".to_string(),
            self.ctx.threads.to_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl Launcher for ProcessLauncher {
    async fn launch(&self, job: Job) -> Result<JobResult> {
        let subject = job.subject.name.clone();
        let args = self.worker_args(&job);
        trace!("{} {}", self.program.display(), args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| RunnerError::Worker {
            subject: subject.clone(),
            message: format!("failed to start worker: {e}"),
        })?;

        debug!("Worker {:?} started for {}", child.id(), job);
        let group = child.id().map(GroupGuard::new);
        let output = child.wait_with_output().await?;
        if let Some(group) = group {
            group.disarm();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match WorkerReply::parse(&stdout) {
            Some(reply) => reply.into_result(&job.function, &subject),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let detail = stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("no reply");
                Err(RunnerError::Worker {
                    subject,
                    message: format!("{} ({})", detail.trim(), output.status),
                })
            }
        }
    }
}
