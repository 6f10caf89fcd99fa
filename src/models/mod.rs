//! Data models for dataset runs
//!
//! Subjects, jobs and the per-subject results they produce.

mod job;
mod metrics;

pub use job::{Job, JobResult, Subject, SubjectList};
pub use metrics::{cell_to_string, MetricsTable};
