//! Dataset run orchestration
//!
//! Enumerate subjects, dispatch one job per subject, aggregate the results.

use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::dispatcher::{Dispatcher, ExecutionMode};
use super::launcher::{InProcessLauncher, Launcher, ProcessLauncher};
use crate::dataset;
use crate::error::Result;
use crate::functions::Registry;
use crate::models::Job;
use crate::results::{aggregate, RunReport, SubjectOutcome};
use crate::utils::timer::RunPhases;

/// What to run, where, and how
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub function: String,
    pub dataset: PathBuf,
    pub parameters: String,
    pub mode: ExecutionMode,
}

impl RunRequest {
    pub fn new(
        function: impl Into<String>,
        dataset: impl Into<PathBuf>,
        parameters: impl Into<String>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            function: function.into(),
            dataset: dataset.into(),
            parameters: parameters.into(),
            mode,
        }
    }
}

/// Settings forwarded to worker processes
#[derive(Clone, Debug, Default)]
pub struct WorkerOptions {
    /// Config file the workers must load to see the same functions
    pub config_path: Option<String>,
    pub verbose: u8,
}

impl WorkerOptions {
    fn args(&self) -> Vec<String> {
        let mut args = vec!["--verbose".to_string(), self.verbose.to_string()];
        if let Some(path) = &self.config_path {
            args.push("--config".to_string());
            args.push(path.clone());
        }
        args
    }
}

/// Run a function over a dataset with the given launcher
///
/// Fails before any dispatch if the function is unknown or the dataset has
/// no subject.
pub async fn run<L, S>(
    request: &RunRequest,
    registry: &Registry,
    launcher: L,
    shutdown: S,
) -> Result<RunReport>
where
    L: Launcher,
    S: Future<Output = ()>,
{
    let started_at = Utc::now();
    let mut phases = RunPhases::start();

    registry.resolve(&request.function)?;
    let subjects = dataset::enumerate(&request.dataset)?;
    phases.mark("enumerate");

    let jobs = Job::for_subjects(&request.function, &subjects, &request.parameters);
    let dispatcher = Dispatcher::new(launcher, request.mode.workers());

    info!(
        "Running {} on {} subjects of {} ({})",
        request.function,
        subjects.len(),
        subjects.root().display(),
        request.mode.name()
    );
    let results = dispatcher.dispatch(jobs, shutdown).await?;
    phases.mark("dispatch");

    let names = subjects.names();
    let dataset = request.dataset.to_string_lossy();
    let table = aggregate(
        &results,
        &names,
        &request.function,
        &dataset,
        &request.parameters,
    )?;
    phases.mark("aggregate");
    debug!("Run timings: {}", phases);

    let outcomes = names
        .iter()
        .zip(&results)
        .map(|(name, result)| SubjectOutcome::from_result(name, result))
        .collect();

    Ok(RunReport {
        function: request.function.clone(),
        dataset: dataset.into_owned(),
        parameters: request.parameters.clone(),
        mode: request.mode.name(),
        workers: dispatcher.max_concurrent(),
        started_at,
        finished_at: Utc::now(),
        duration_ms: phases.total().as_millis() as u64,
        outcomes,
        table,
    })
}

/// Run with the launcher matching the request's execution mode
///
/// Serial runs stay in-process; pool runs re-execute this binary as
/// worker processes.
pub async fn run_with_mode<S>(
    request: &RunRequest,
    registry: Arc<Registry>,
    options: &WorkerOptions,
    shutdown: S,
) -> Result<RunReport>
where
    S: Future<Output = ()>,
{
    // Settle the per-job thread limit before any worker exists
    let ctx = request.mode.job_context();
    debug!("Job context: {:?}", ctx);

    match request.mode {
        ExecutionMode::Serial => {
            let launcher = InProcessLauncher::new(registry.clone(), ctx);
            run(request, &registry, launcher, shutdown).await
        }
        ExecutionMode::Pool(_) => {
            let launcher = ProcessLauncher::current_exe(ctx)?.with_extra_args(options.args());
            run(request, &registry, launcher, shutdown).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RunnerError, EXIT_INTERRUPTED, EXIT_JOB_FAILED};
    use crate::executor::worker::WorkerReply;
    use crate::functions::{JobContext, SubjectTest};
    use crate::models::{JobResult, MetricsTable};
    use crate::results::compare_tables;
    use serde_json::json;
    use std::future::pending;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn dataset(subjects: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for s in subjects {
            std::fs::create_dir(tmp.path().join(s)).unwrap();
        }
        tmp
    }

    /// One row holding the subject folder name; `sub-02` sleeps longest
    struct EchoTest;

    impl SubjectTest for EchoTest {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "test function"
        }

        fn run(&self, subject: &Path, parameters: &str, _ctx: &JobContext) -> anyhow::Result<JobResult> {
            let name = subject.file_name().unwrap().to_string_lossy().into_owned();
            if parameters == "fail" && name == "sub-02" {
                anyhow::bail!("cannot segment {}", name);
            }
            let delay = if name == "sub-01" { 60 } else { 5 };
            std::thread::sleep(Duration::from_millis(delay));
            Ok(JobResult::success(MetricsTable::single_row([
                ("origin", json!(name)),
                ("value", json!(1.5)),
            ])))
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::with_builtins();
        registry.register(EchoTest);
        registry
    }

    async fn run_serial(request: &RunRequest) -> Result<RunReport> {
        let registry = Arc::new(registry());
        let launcher = InProcessLauncher::new(registry.clone(), JobContext::default());
        run(request, &registry, launcher, pending()).await
    }

    /// Subject-tag and origin columns must agree row by row
    fn assert_aligned(report: &RunReport) {
        let subjects = report.table.column("subject").unwrap();
        let origins = report.table.column("origin").unwrap();
        assert_eq!(subjects, origins);
    }

    #[tokio::test]
    async fn test_three_subjects_serial() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03"]);
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Serial);

        let report = run_serial(&request).await.unwrap();
        assert_eq!(report.rows(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_aligned(&report);

        let dataset = tmp.path().to_string_lossy().into_owned();
        for row in 0..3 {
            assert_eq!(report.table.get(row, "script"), Some(&json!("echo")));
            assert_eq!(report.table.get(row, "dataset"), Some(&json!(dataset)));
        }
    }

    #[tokio::test]
    async fn test_pool_in_process_keeps_alignment() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03", "sub-04"]);
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Pool(4));

        let registry = Arc::new(registry());
        let launcher = InProcessLauncher::new(registry.clone(), JobContext::single_threaded());
        let report = run(&request, &registry, launcher, pending()).await.unwrap();

        assert_eq!(report.rows(), 4);
        assert_eq!(report.workers, 4);
        assert_aligned(&report);
    }

    #[tokio::test]
    async fn test_empty_dataset_never_dispatches() {
        let tmp = dataset(&[]);
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Serial);

        let err = run_serial(&request).await.unwrap_err();
        assert!(matches!(err, RunnerError::NoSubjects(_)));
    }

    #[tokio::test]
    async fn test_unknown_function_before_dispatch() {
        let tmp = dataset(&["sub-01"]);
        let request = RunRequest::new("nope", tmp.path(), "", ExecutionMode::Serial);

        let err = run_serial(&request).await.unwrap_err();
        assert!(matches!(err, RunnerError::UnknownFunction(_)));
    }

    #[tokio::test]
    async fn test_failing_subject_fails_run() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03"]);
        let request = RunRequest::new("echo", tmp.path(), "fail", ExecutionMode::Serial);

        let err = run_serial(&request).await.unwrap_err();
        assert_eq!(err.exit_code(), EXIT_JOB_FAILED);
        assert!(err.to_string().contains("sub-02"));
    }

    #[tokio::test]
    async fn test_repeated_runs_compare_equal() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03"]);
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Serial);

        let first = run_serial(&request).await.unwrap();
        let second = run_serial(&request).await.unwrap();
        assert!(compare_tables(&first.table, &second.table, 1e-9, &[]).is_identical());
    }

    /// Worker stand-in: prints a reply tagged with the subject folder name
    /// after a delay that makes later subjects finish first.
    fn sh_worker(script_body: &str) -> ProcessLauncher {
        ProcessLauncher::new(
            "sh",
            vec!["-c".to_string(), script_body.to_string(), "sh".to_string()],
            JobContext::single_threaded(),
        )
    }

    fn reply_script() -> String {
        // $4 is the subject path (after --function <f> --subject)
        let template = serde_json::to_string(&WorkerReply::Done(JobResult::success(
            MetricsTable::single_row([("origin", "NAME")]),
        )))
        .unwrap();
        let printf = template.replace("NAME", "%s");
        format!(
            r#"name=$(basename "$4"); case "$name" in sub-01) sleep 0.3;; sub-02) sleep 0.15;; esac; printf '{printf}\n' "$name""#
        )
    }

    #[tokio::test]
    async fn test_process_pool_keeps_submission_order() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03"]);
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Pool(3));

        let report = run(&request, &registry(), sh_worker(&reply_script()), pending())
            .await
            .unwrap();
        assert_eq!(report.rows(), 3);
        assert_aligned(&report);
    }

    #[tokio::test]
    async fn test_process_pool_failure() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03"]);
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Pool(2));
        let script = format!(
            r#"case "$(basename "$4")" in sub-02) echo 'image not found' >&2; exit 1;; esac; {}"#,
            reply_script()
        );

        let err = run(&request, &registry(), sh_worker(&script), pending())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_JOB_FAILED);
        assert!(err.to_string().contains("image not found"));
    }

    #[tokio::test]
    async fn test_process_pool_interrupt_kills_workers() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03"]);
        let marker = tmp.path().join("finished");
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Pool(3));
        let script = format!(
            r#"case "$(basename "$4")" in sub-03) ;; *) sleep 2; touch '{}';; esac; {}"#,
            marker.display(),
            reply_script()
        );

        let start = Instant::now();
        let err = run(
            &request,
            &registry(),
            sh_worker(&script),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RunnerError::Interrupted));
        assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
        assert!(start.elapsed() < Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists(), "killed workers must not finish their job");
    }

    #[tokio::test]
    async fn test_process_pool_interrupt_kills_grandchildren() {
        let tmp = dataset(&["sub-01", "sub-02", "sub-03"]);
        let marker = tmp.path().join("finished");
        let request = RunRequest::new("echo", tmp.path(), "", ExecutionMode::Pool(3));
        let script = format!(
            r#"case "$(basename "$4")" in sub-03) ;; *) (sleep 2; touch '{}') & sleep 3;; esac; {}"#,
            marker.display(),
            reply_script()
        );

        let err = run(
            &request,
            &registry(),
            sh_worker(&script),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunnerError::Interrupted));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists(), "programs started by workers must die with them");
    }

    #[tokio::test]
    async fn test_serial_interrupt_kills_running_program() {
        use crate::config::CommandSpec;
        use crate::functions::CommandTest;

        let tmp = dataset(&["sub-01", "sub-02"]);
        let mut spec = CommandSpec::new("slowseg", "sh");
        spec.args = vec!["-c".into(), "sleep 2; touch finished".into()];
        let mut registry = Registry::with_builtins();
        registry.register(CommandTest::new(spec));
        let registry = Arc::new(registry);

        let request = RunRequest::new("slowseg", tmp.path(), "", ExecutionMode::Serial);
        let launcher = InProcessLauncher::new(registry.clone(), JobContext::default());

        let start = Instant::now();
        let err = run(
            &request,
            &registry,
            launcher,
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
        assert!(start.elapsed() < Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        for subject in ["sub-01", "sub-02"] {
            assert!(!tmp.path().join(subject).join("finished").exists());
        }
    }
}
