//! Worker pool dispatch
//!
//! Runs one job per subject with at most N jobs in flight. Results come
//! back in submission order whatever the completion order. The first
//! failure or a stop signal abandons the whole run: every job still in
//! flight is dropped, which kills its worker process.

use futures::future::try_join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::launcher::Launcher;
use crate::error::{Result, RunnerError};
use crate::functions::JobContext;
use crate::models::{Job, JobResult};
use crate::utils::timer::Timer;

/// How jobs are executed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One job at a time inside the controlling process
    Serial,
    /// Up to N worker processes
    Pool(usize),
}

impl ExecutionMode {
    /// Resolve the mode from a requested worker count
    ///
    /// `None` or `Some(0)` means one worker per available processing unit.
    pub fn from_jobs(jobs: Option<usize>, serial: bool) -> Self {
        if serial {
            return ExecutionMode::Serial;
        }
        match jobs {
            Some(n) if n > 0 => ExecutionMode::Pool(n),
            _ => ExecutionMode::Pool(available_cpus()),
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionMode::Serial => 1,
            ExecutionMode::Pool(n) => (*n).max(1),
        }
    }

    /// Settings for each job
    ///
    /// Under a pool, the pool is the parallelism: each job gets one thread.
    pub fn job_context(&self) -> JobContext {
        match self {
            ExecutionMode::Serial => JobContext::default(),
            ExecutionMode::Pool(_) => JobContext::single_threaded(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ExecutionMode::Serial => "serial".to_string(),
            ExecutionMode::Pool(n) => format!("pool({n})"),
        }
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Bounded fan-out of jobs over a launcher
pub struct Dispatcher<L> {
    launcher: L,
    max_concurrent: usize,
}

impl<L: Launcher> Dispatcher<L> {
    pub fn new(launcher: L, max_concurrent: usize) -> Self {
        Self {
            launcher,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run every job and return the results in submission order
    ///
    /// Resolves to `Interrupted` as soon as `shutdown` completes, and to the
    /// first job error otherwise. In both cases no result is returned.
    pub async fn dispatch<S>(&self, jobs: Vec<Job>, shutdown: S) -> Result<Vec<JobResult>>
    where
        S: Future<Output = ()>,
    {
        let total = jobs.len();
        let semaphore = Semaphore::new(self.max_concurrent);
        let completed = AtomicUsize::new(0);
        let start = Instant::now();

        info!(
            "Dispatching {} jobs ({} concurrent)",
            total, self.max_concurrent
        );

        let pending = jobs.into_iter().map(|job| {
            let semaphore = &semaphore;
            let completed = &completed;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| RunnerError::Interrupted)?;

                debug!("Starting {}", job);
                let label = job.to_string();
                let subject = job.subject.name.clone();
                let timer = Timer::start(label.clone());

                let result = self.launcher.launch(job).await;
                let elapsed = timer.stop();

                match &result {
                    Ok(r) => {
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        info!(
                            "[{}/{}] {} done: status {}, {} rows, {}ms",
                            done,
                            total,
                            subject,
                            r.status,
                            r.metrics.len(),
                            elapsed.as_millis()
                        );
                    }
                    Err(e) => error!("{} failed: {}", label, e),
                }
                result
            }
        });

        // An interrupt wins over job errors that it caused
        tokio::select! {
            biased;

            _ = shutdown => {
                warn!("Caught interrupt, terminating workers");
                Err(RunnerError::Interrupted)
            }
            results = try_join_all(pending) => {
                let results = results?;
                info!(
                    "All {} jobs completed in {}ms",
                    results.len(),
                    start.elapsed().as_millis()
                );
                Ok(results)
            }
        }
    }
}

/// Completes on Ctrl-C (and SIGTERM on unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricsTable, Subject, SubjectList};
    use std::future::pending;
    use std::sync::Arc;
    use std::time::Duration;

    /// Launcher whose jobs finish in reverse submission order
    struct ReversedLauncher {
        total: u64,
        unit_ms: u64,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        fail_on: Option<String>,
    }

    impl ReversedLauncher {
        fn new(total: usize) -> Self {
            Self {
                total: total as u64,
                unit_ms: 15,
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                fail_on: None,
            }
        }
    }

    impl Launcher for ReversedLauncher {
        async fn launch(&self, job: Job) -> Result<JobResult> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = (self.total - job.index as u64) * self.unit_ms;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.as_deref() == Some(job.subject.name.as_str()) {
                return Err(RunnerError::Execution {
                    subject: job.subject.name,
                    message: "boom".into(),
                });
            }
            Ok(JobResult::success(MetricsTable::single_row([(
                "origin",
                job.subject.name,
            )])))
        }
    }

    fn jobs(n: usize) -> Vec<Job> {
        let subjects = (1..=n)
            .map(|i| Subject::new(format!("sub-{i:02}"), format!("/data/sub-{i:02}")))
            .collect();
        Job::for_subjects("fake", &SubjectList::new("/data", subjects), "")
    }

    fn origins(results: &[JobResult]) -> Vec<String> {
        results
            .iter()
            .map(|r| r.metrics.get(0, "origin").unwrap().as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_results_in_submission_order() {
        let dispatcher = Dispatcher::new(ReversedLauncher::new(5), 5);
        let results = dispatcher.dispatch(jobs(5), pending()).await.unwrap();
        assert_eq!(
            origins(&results),
            ["sub-01", "sub-02", "sub-03", "sub-04", "sub-05"]
        );
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let launcher = ReversedLauncher::new(6);
        let peak = launcher.peak.clone();
        let dispatcher = Dispatcher::new(launcher, 2);

        let results = dispatcher.dispatch(jobs(6), pending()).await.unwrap();
        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_single_worker() {
        let launcher = ReversedLauncher::new(3);
        let peak = launcher.peak.clone();
        let results = Dispatcher::new(launcher, 1)
            .dispatch(jobs(3), pending())
            .await
            .unwrap();
        assert_eq!(origins(&results), ["sub-01", "sub-02", "sub-03"]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_job_failure_aborts_run() {
        let mut launcher = ReversedLauncher::new(3);
        launcher.fail_on = Some("sub-02".to_string());

        let err = Dispatcher::new(launcher, 3)
            .dispatch(jobs(3), pending())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Execution { ref subject, .. } if subject == "sub-02"));
        assert_eq!(err.exit_code(), crate::error::EXIT_JOB_FAILED);
    }

    #[tokio::test]
    async fn test_interrupt_stops_dispatch() {
        let mut launcher = ReversedLauncher::new(3);
        launcher.unit_ms = 200;
        let dispatcher = Dispatcher::new(launcher, 3);
        let start = Instant::now();

        let err = dispatcher
            .dispatch(jobs(3), tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Interrupted));
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_interrupt_wins_over_job_failure() {
        let mut launcher = ReversedLauncher::new(3);
        launcher.unit_ms = 0;
        launcher.fail_on = Some("sub-01".to_string());

        let err = Dispatcher::new(launcher, 3)
            .dispatch(jobs(3), std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Interrupted));
        assert_eq!(err.exit_code(), crate::error::EXIT_INTERRUPTED);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let results = Dispatcher::new(ReversedLauncher::new(0), 4)
            .dispatch(Vec::new(), pending())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_execution_mode() {
        assert_eq!(ExecutionMode::from_jobs(Some(3), false), ExecutionMode::Pool(3));
        assert_eq!(ExecutionMode::from_jobs(Some(3), true), ExecutionMode::Serial);
        assert!(ExecutionMode::from_jobs(None, false).workers() >= 1);
        assert_eq!(
            ExecutionMode::from_jobs(Some(0), false),
            ExecutionMode::from_jobs(None, false)
        );
        assert_eq!(ExecutionMode::Pool(4).job_context().threads, 1);
        assert_eq!(ExecutionMode::Serial.workers(), 1);
    }
}
