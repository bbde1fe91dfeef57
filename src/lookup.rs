//! Point and free-text queries over a unified table.
//!
//! Both lookups borrow the table and hand back [`Record`] views into it; the
//! table is never modified.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    data::{Value, display_cell},
    schema::{CANONICAL_KEY, normalize_key},
    table::{Row, Table},
};

/// One row of a table, paired with the table's column names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    columns: &'a [String],
    cells: &'a Row,
}

impl<'a> Record<'a> {
    pub fn new(columns: &'a [String], cells: &'a Row) -> Self {
        Self { columns, cells }
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|name| name == column)?;
        self.cells.get(idx)?.as_ref()
    }

    pub fn key(&self) -> Option<&'a Value> {
        self.get(CANONICAL_KEY)
    }

    /// `(column, cell)` pairs in column order, absent cells included.
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, Option<&'a Value>)> + 'a {
        let columns: &'a [String] = self.columns;
        let cells: &'a Row = self.cells;
        columns
            .iter()
            .map(String::as_str)
            .zip(cells.iter().map(Option::as_ref))
    }

    /// Cell display strings in column order; absent cells are `""`.
    pub fn display_cells(&self) -> Vec<String> {
        self.cells.iter().map(display_cell).collect()
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.fields() {
            map.serialize_entry(column, &cell)?;
        }
        map.end()
    }
}

/// First row whose store key equals `key`, ignoring case and surrounding whitespace.
pub fn find_exact<'a>(table: &'a Table, key: &str) -> Option<Record<'a>> {
    find_exact_in(table, CANONICAL_KEY, key)
}

/// Like [`find_exact`] but matching on an explicitly named column.
pub fn find_exact_in<'a>(table: &'a Table, column: &str, key: &str) -> Option<Record<'a>> {
    let idx = table.column_index(column)?;
    let wanted = normalize_key(key);
    table
        .rows()
        .iter()
        .find(|row| {
            row[idx]
                .as_ref()
                .is_some_and(|value| normalize_key(&value.as_display()) == wanted)
        })
        .map(|row| Record::new(table.columns(), row))
}

/// Every row with a cell containing `query`, case-insensitively, in table order.
///
/// An empty query matches every row. Absent cells never match a non-empty query.
pub fn find_contains<'a>(table: &'a Table, query: &str) -> Vec<Record<'a>> {
    let needle = query.to_lowercase();
    table
        .rows()
        .iter()
        .filter(|row| {
            needle.is_empty()
                || row.iter().flatten().any(|value| {
                    value.as_display().to_lowercase().contains(needle.as_str())
                })
        })
        .map(|row| Record::new(table.columns(), row))
        .collect()
}
