//! Job execution engine
//!
//! Launchers run one job (in-process or in a worker process), the
//! dispatcher fans jobs out over a bounded pool, and the runner ties
//! enumeration, dispatch and aggregation together.

mod dispatcher;
mod launcher;
mod runner;
mod worker;

pub use dispatcher::{shutdown_signal, ExecutionMode};
pub use runner::{run_with_mode, RunRequest, WorkerOptions};
pub use worker::{execute as execute_worker, WorkerRequest};
