//! Aggregated table storage
//!
//! Tables are saved as CSV (`.csv`) or as a JSON array of records (any
//! other extension) so a later run can be compared against them.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

use super::aggregate::TAG_COLUMNS;
use crate::models::{cell_to_string, MetricsTable};

/// Write a table as CSV into any writer
pub fn write_csv<W: Write>(table: &MetricsTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(cell_to_string))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render a table as a CSV string
pub fn table_to_csv(table: &MetricsTable) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Save a table, choosing the format from the file extension
pub fn save_table(path: impl AsRef<Path>, table: &MetricsTable) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create results file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    if is_csv_file(path) {
        write_csv(table, writer)?;
    } else {
        serde_json::to_writer_pretty(writer, &table.records())
            .context("Failed to serialize results")?;
    }

    info!("Saved {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Load a table saved by `save_table`
pub fn load_table(path: impl AsRef<Path>) -> Result<MetricsTable> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open results file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut table = MetricsTable::new();
    if is_csv_file(path) {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        for record in rdr.records() {
            let record =
                record.with_context(|| format!("Invalid CSV in {}", path.display()))?;
            table.push_row(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, cell)| (h, read_cell(h, cell))),
            );
        }
    } else {
        let records: Vec<Map<String, Value>> = serde_json::from_reader(reader)
            .with_context(|| format!("Invalid JSON results in {}", path.display()))?;
        for record in records {
            table.push_row(record);
        }
    }

    Ok(table)
}

/// Tag columns come back verbatim; other cells are parsed
fn read_cell(column: &str, cell: &str) -> Value {
    if TAG_COLUMNS.contains(&column) {
        Value::String(cell.to_string())
    } else {
        parse_cell(cell)
    }
}

/// Parse a CSV cell back into a typed value
fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = cell.parse::<i64>() {
        return n.into();
    }
    if let Ok(x) = cell.parse::<f64>() {
        if x.is_finite() {
            return x.into();
        }
    }
    match cell {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn is_csv_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}
