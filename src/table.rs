//! In-memory table model shared by every stage of the pipeline.
//!
//! A [`Table`] is an ordered list of uniquely named columns plus ordered rows,
//! each row holding exactly one cell per column. Tables are never edited in
//! place: renames and joins build a new table.

use std::collections::HashSet;

use serde::Serialize;

use crate::{data::Value, error::TableError};

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// The empty table. Also the loader's uniform failure signal.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row: idx,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Builds a table from loosely shaped input as read from a spreadsheet.
    ///
    /// Header names are made unique, rows are padded or truncated to the
    /// header width, and rows with no present cell are dropped.
    pub fn from_raw(headers: Vec<String>, rows: Vec<Row>) -> Self {
        let columns = unique_names(headers);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(Option::is_some))
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// A table with no rows. Header-only tables count as empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    /// Returns a copy with the same rows under new column names.
    pub fn with_columns(&self, columns: Vec<String>) -> Result<Self, TableError> {
        Self::new(columns, self.rows.clone())
    }
}

/// Makes header names unique: blanks become `column_N` (1-based position),
/// repeats get `_2`, `_3`, ... appended.
pub fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut result = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("column_{}", idx + 1)
        } else {
            name
        };
        let candidate = free_name(&base, &taken);
        taken.insert(candidate.clone());
        result.push(candidate);
    }
    result
}

/// `base` if it is not taken, otherwise the first free `base_N` with N >= 2.
pub fn free_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
