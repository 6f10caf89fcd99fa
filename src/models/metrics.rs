//! Structured metrics tables
//!
//! A small column-ordered table whose schema is defined by whichever
//! function produced it. Cells are JSON values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Row-aligned table with a dynamic set of columns
///
/// Every row always has exactly `columns.len()` cells. Adding a row with a
/// column the table has not seen yet appends that column and back-fills the
/// existing rows with `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table holding a single row
    pub fn single_row<I, K, V>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut table = Self::new();
        table.push_row(cells);
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Get a cell by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All cells of one column, top to bottom
    #[cfg(test)]
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Append a row given as (column, value) pairs
    pub fn push_row<I, K, V>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut row = vec![Value::Null; self.columns.len()];
        for (key, value) in cells {
            let idx = self.ensure_column(key.into());
            if idx >= row.len() {
                row.resize(idx + 1, Value::Null);
            }
            row[idx] = value.into();
        }
        self.rows.push(row);
    }

    /// Concatenate another table below this one
    ///
    /// Columns are unioned in first-seen order; cells missing on either side
    /// are `null`.
    pub fn append(&mut self, other: &MetricsTable) {
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|c| self.ensure_column(c.clone()))
            .collect();

        for other_row in &other.rows {
            let mut row = vec![Value::Null; self.columns.len()];
            for (cell, &idx) in other_row.iter().zip(&mapping) {
                row[idx] = cell.clone();
            }
            self.rows.push(row);
        }
    }

    /// Set a whole column from a value per row, adding the column if needed
    ///
    /// Returns false (and leaves the table untouched) when the number of
    /// values does not match the number of rows.
    pub fn set_column<V: Into<Value>>(&mut self, name: &str, values: Vec<V>) -> bool {
        if values.len() != self.rows.len() {
            return false;
        }
        let idx = self.ensure_column(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value.into();
        }
        true
    }

    /// Check the row-width invariant, e.g. after deserializing
    pub fn is_well_formed(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.columns.len())
    }

    /// Rows as JSON objects keyed by column name
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    fn ensure_column(&mut self, name: String) -> usize {
        if let Some(idx) = self.column_index(&name) {
            return idx;
        }
        self.columns.push(name);
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        self.columns.len() - 1
    }
}

/// Render a cell the way tables and CSV files show it
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for MetricsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(cell_to_string).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_row_adds_columns() {
        let mut table = MetricsTable::single_row([("dice", json!(0.9))]);
        table.push_row([("dice", json!(0.8)), ("volume", json!(120))]);

        assert_eq!(table.columns(), ["dice", "volume"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "volume"), Some(&Value::Null));
        assert_eq!(table.get(1, "volume"), Some(&json!(120)));
        assert!(table.is_well_formed());
    }

    #[test]
    fn test_append_unions_columns() {
        let mut a = MetricsTable::single_row([("x", 1)]);
        let b = MetricsTable::single_row([("y", 2), ("x", 3)]);
        a.append(&b);

        assert_eq!(a.columns(), ["x", "y"]);
        assert_eq!(a.column("x").unwrap(), vec![&json!(1), &json!(3)]);
        assert_eq!(a.column("y").unwrap(), vec![&Value::Null, &json!(2)]);
    }

    #[test]
    fn test_append_empty_table() {
        let mut a = MetricsTable::single_row([("x", 1)]);
        a.append(&MetricsTable::new());
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut table = MetricsTable::single_row([("x", 1)]);
        assert!(!table.set_column("subject", vec!["a", "b"]));
        assert!(table.column_index("subject").is_none());
        assert!(table.set_column("subject", vec!["a"]));
        assert_eq!(table.get(0, "subject"), Some(&json!("a")));
    }

    #[test]
    fn test_records_keep_column_order() {
        let table = MetricsTable::single_row([("b", 1), ("a", 2)]);
        let records = table.records();
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Value::Null), "");
        assert_eq!(cell_to_string(&json!("sub-01")), "sub-01");
        assert_eq!(cell_to_string(&json!(1.5)), "1.5");
    }
}
