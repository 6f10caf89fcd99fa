//! Comparison of two aggregated tables
//!
//! Rows are matched by subject and by position within the subject. Numeric
//! cells are equal within an absolute tolerance.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{cell_to_string, MetricsTable};

const SUBJECT_COLUMN: &str = "subject";

/// One cell that differs between the two tables
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellDifference {
    pub subject: String,
    /// Row position within the subject
    pub row: usize,
    pub column: String,
    pub left: Value,
    pub right: Value,
}

/// Subject whose row count differs between the two tables
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowCountMismatch {
    pub subject: String,
    pub left: usize,
    pub right: usize,
}

/// Result of comparing two tables
#[derive(Clone, Debug, Default, Serialize)]
pub struct TableComparison {
    pub compared_rows: usize,
    pub matching_rows: usize,
    pub differences: Vec<CellDifference>,
    pub row_count_mismatches: Vec<RowCountMismatch>,
    pub only_left: Vec<String>,
    pub only_right: Vec<String>,
}

impl TableComparison {
    /// True when both tables hold the same data within tolerance
    pub fn is_identical(&self) -> bool {
        self.differences.is_empty()
            && self.row_count_mismatches.is_empty()
            && self.only_left.is_empty()
            && self.only_right.is_empty()
    }
}

/// Compare two aggregated tables, skipping the `ignore` columns
pub fn compare_tables(
    left: &MetricsTable,
    right: &MetricsTable,
    tolerance: f64,
    ignore: &[String],
) -> TableComparison {
    let left_rows = rows_by_subject(left);
    let right_rows = rows_by_subject(right);

    let mut columns: Vec<&str> = left.columns().iter().map(String::as_str).collect();
    for column in right.columns() {
        if !columns.contains(&column.as_str()) {
            columns.push(column.as_str());
        }
    }
    columns.retain(|c| !ignore.iter().any(|i| i.as_str() == *c));

    let mut comparison = TableComparison::default();

    for (subject, lrows) in &left_rows {
        let Some(rrows) = right_rows.get(subject) else {
            comparison.only_left.push(subject.clone());
            continue;
        };

        if lrows.len() != rrows.len() {
            comparison.row_count_mismatches.push(RowCountMismatch {
                subject: subject.clone(),
                left: lrows.len(),
                right: rrows.len(),
            });
        }

        for (row, (&li, &ri)) in lrows.iter().zip(rrows).enumerate() {
            comparison.compared_rows += 1;
            let mut row_matches = true;

            for column in &columns {
                let lv = cell(left, li, column);
                let rv = cell(right, ri, column);
                if !values_match(&lv, &rv, tolerance) {
                    row_matches = false;
                    comparison.differences.push(CellDifference {
                        subject: subject.clone(),
                        row,
                        column: column.to_string(),
                        left: lv,
                        right: rv,
                    });
                }
            }

            if row_matches {
                comparison.matching_rows += 1;
            }
        }
    }

    comparison.only_right = right_rows
        .keys()
        .filter(|s| !left_rows.contains_key(*s))
        .cloned()
        .collect();

    comparison
}

/// Row indices grouped by subject, keeping table order within a subject
fn rows_by_subject(table: &MetricsTable) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for i in 0..table.len() {
        let subject = table
            .get(i, SUBJECT_COLUMN)
            .map(cell_to_string)
            .unwrap_or_default();
        groups.entry(subject).or_default().push(i);
    }
    groups
}

fn cell(table: &MetricsTable, row: usize, column: &str) -> Value {
    table.get(row, column).cloned().unwrap_or(Value::Null)
}

fn values_match(left: &Value, right: &Value, tolerance: f64) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => (l - r).abs() <= tolerance,
        _ => left == right,
    }
}
