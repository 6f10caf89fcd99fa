//! Run reports
//!
//! Everything a finished run produced: metadata, per-subject outcomes and
//! the aggregated table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::models::{JobResult, MetricsTable};

/// Outcome of one subject
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubjectOutcome {
    pub subject: String,
    pub status: i32,
    pub output: String,
    pub rows: usize,
}

impl SubjectOutcome {
    pub fn from_result(subject: &str, result: &JobResult) -> Self {
        Self {
            subject: subject.to_string(),
            status: result.status,
            output: result.output.clone(),
            rows: result.metrics.len(),
        }
    }
}

/// Report of one run
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub function: String,
    pub dataset: String,
    pub parameters: String,
    pub mode: String,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcomes: Vec<SubjectOutcome>,
    #[serde(rename = "results")]
    pub table: MetricsTable,
}

impl RunReport {
    pub fn subjects(&self) -> usize {
        self.outcomes.len()
    }

    /// Jobs that returned status 0
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == 0).count()
    }

    /// Jobs that returned a non-zero status
    pub fn failed(&self) -> usize {
        self.subjects() - self.succeeded()
    }

    pub fn rows(&self) -> usize {
        self.table.len()
    }

    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            (self.succeeded() as f64 / self.subjects() as f64) * 100.0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: {}/{} subjects ok ({:.1}%), {} rows in {}ms [{}]",
            self.function,
            self.dataset,
            self.succeeded(),
            self.subjects(),
            self.success_rate(),
            self.rows(),
            self.duration_ms,
            self.mode
        )
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Report with one row per subject and the given statuses
    pub fn report(statuses: &[i32]) -> RunReport {
        let mut table = MetricsTable::new();
        let mut outcomes = Vec::new();
        for (i, status) in statuses.iter().enumerate() {
            let subject = format!("sub-{:02}", i + 1);
            table.push_row([
                ("csa", serde_json::Value::from(70.5 + i as f64)),
                ("subject", subject.clone().into()),
            ]);
            outcomes.push(SubjectOutcome {
                subject,
                status: *status,
                output: String::new(),
                rows: 1,
            });
        }

        let now = Utc::now();
        RunReport {
            function: "sct_propseg".to_string(),
            dataset: "/data".to_string(),
            parameters: String::new(),
            mode: "pool(2)".to_string(),
            workers: 2,
            started_at: now,
            finished_at: now,
            duration_ms: 42,
            outcomes,
            table,
        }
    }
}
