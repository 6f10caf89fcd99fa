//! Result aggregation
//!
//! Concatenates per-subject metrics tables and tags every row with where it
//! came from.

use tracing::debug;

use crate::error::{Result, RunnerError};
use crate::models::{JobResult, MetricsTable};

/// Columns added to every aggregated row
pub const TAG_COLUMNS: [&str; 4] = ["subject", "script", "dataset", "parameters"];

/// Merge job results into one table
///
/// `results` and `subject_names` must be in the same order: all rows of
/// `results[i]` are tagged with `subject_names[i]`. A result with no rows
/// contributes nothing.
pub fn aggregate(
    results: &[JobResult],
    subject_names: &[&str],
    function: &str,
    dataset: &str,
    parameters: &str,
) -> Result<MetricsTable> {
    if results.len() != subject_names.len() {
        return Err(RunnerError::ResultMismatch {
            results: results.len(),
            subjects: subject_names.len(),
        });
    }

    let mut table = MetricsTable::new();
    let mut subjects = Vec::new();

    for (result, name) in results.iter().zip(subject_names) {
        table.append(&result.metrics);
        subjects.extend(std::iter::repeat(*name).take(result.metrics.len()));
    }

    let rows = table.len();
    table.set_column(TAG_COLUMNS[0], subjects);
    table.set_column(TAG_COLUMNS[1], vec![function; rows]);
    table.set_column(TAG_COLUMNS[2], vec![dataset; rows]);
    table.set_column(TAG_COLUMNS[3], vec![parameters; rows]);

    debug!(
        "Aggregated {} rows x {} columns from {} subjects",
        rows,
        table.columns().len(),
        results.len()
    );
    Ok(table)
}
