//! Output formatters for run reports
//!
//! Provides table, JSON, CSV and one-line summary formats.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{cell_to_string, MetricsTable};
use crate::results::storage::table_to_csv;
use crate::results::{RunReport, TableComparison};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a run report
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_report_table(report)),
            OutputFormat::Json => to_json(report, false),
            OutputFormat::JsonPretty => to_json(report, true),
            OutputFormat::Csv => table_to_csv(&report.table),
            OutputFormat::Summary => Ok(report.to_string()),
        }
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str("subjects :\n");
        for (i, outcome) in report.outcomes.iter().enumerate() {
            output.push_str(&format!("{:4}  {}\n", i, outcome.subject));
        }

        output.push_str("results :\n");
        if report.table.is_empty() {
            output.push_str("(no rows)\n");
        } else {
            output.push_str(&render_table(&report.table));
        }

        let failed: Vec<_> = report.outcomes.iter().filter(|o| o.status != 0).collect();
        if !failed.is_empty() {
            output.push_str("\nnon-zero status:\n");
            for outcome in failed {
                let first_line = outcome.output.lines().next().unwrap_or("");
                output.push_str(&format!(
                    "  {} (status {}) {}\n",
                    outcome.subject, outcome.status, first_line
                ));
            }
        }

        let ok = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", report.succeeded())
        } else {
            report.succeeded().to_string()
        };
        let not_ok = if self.colorize && report.failed() > 0 {
            format!("\x1b[31m{}\x1b[0m", report.failed())
        } else {
            report.failed().to_string()
        };

        output.push_str(&format!(
            "\nSubjects: {} | Status 0: {} | Non-zero: {} | Rows: {} | Duration: {}ms\n",
            report.subjects(),
            ok,
            not_ok,
            report.rows(),
            report.duration_ms
        ));

        output
    }

    /// Format a table comparison
    pub fn format_comparison(&self, comparison: &TableComparison) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(comparison, false),
            OutputFormat::JsonPretty => to_json(comparison, true),
            _ => Ok(self.format_comparison_text(comparison)),
        }
    }

    fn format_comparison_text(&self, comparison: &TableComparison) -> String {
        let mut output = String::new();

        for subject in &comparison.only_left {
            output.push_str(&format!("only in first:  {subject}\n"));
        }
        for subject in &comparison.only_right {
            output.push_str(&format!("only in second: {subject}\n"));
        }
        for m in &comparison.row_count_mismatches {
            output.push_str(&format!(
                "row count differs for {}: {} vs {}\n",
                m.subject, m.left, m.right
            ));
        }
        for d in &comparison.differences {
            output.push_str(&format!(
                "{} row {} {}: {} vs {}\n",
                d.subject,
                d.row,
                d.column,
                cell_to_string(&d.left),
                cell_to_string(&d.right)
            ));
        }

        let verdict = match (comparison.is_identical(), self.colorize) {
            (true, true) => "\x1b[32midentical\x1b[0m",
            (true, false) => "identical",
            (false, true) => "\x1b[31mdifferent\x1b[0m",
            (false, false) => "different",
        };
        output.push_str(&format!(
            "{}/{} rows match: {}\n",
            comparison.matching_rows, comparison.compared_rows, verdict
        ));
        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("Failed to serialize output")
}

/// Render a table with aligned columns and a row index
pub fn render_table(table: &MetricsTable) -> String {
    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    let index_width = table.len().saturating_sub(1).to_string().len();
    let widths: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    output.push_str(&" ".repeat(index_width));
    for (name, &width) in table.columns().iter().zip(&widths) {
        output.push_str(&format!("  {name:>width$}"));
    }
    output.push('\n');

    for (i, row) in cells.iter().enumerate() {
        output.push_str(&format!("{i:>index_width$}"));
        for (cell, &width) in row.iter().zip(&widths) {
            output.push_str(&format!("  {cell:>width$}"));
        }
        output.push('\n');
    }

    output
}
