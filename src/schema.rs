//! Column-name normalization and store-key resolution.
//!
//! Every source sheet names its columns a little differently ("No. Tienda",
//! " NO TIENDA", "numero de tienda"). This module canonicalizes names so the
//! sources can be joined:
//!
//! - [`normalize`] trims and lowercases every column name
//! - [`resolve_key`] finds the store-key column by scanning an alias list in
//!   priority order
//! - [`rename_key`] renames the resolved column to [`CANONICAL_KEY`]
//!
//! None of these edit their input; each returns a new [`Table`].

use std::collections::HashSet;

use log::debug;

use crate::{
    error::TableError,
    table::{Table, free_name, unique_names},
};

/// Name of the store-key column once resolved.
pub const CANONICAL_KEY: &str = "no_tienda";

/// Known spellings of the store-key column, most specific first.
pub const DEFAULT_KEY_ALIASES: &[&str] = &[
    "no.tienda",
    "no tienda",
    "no_tienda",
    "numero de tienda",
    "notienda",
];

pub fn default_key_aliases() -> Vec<String> {
    DEFAULT_KEY_ALIASES.iter().map(|s| s.to_string()).collect()
}

pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Store numbers compare as opaque text: trimmed and uppercased, never parsed,
/// so leading zeros and alphanumeric codes survive.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Trims and lowercases every column name, preserving order and rows.
///
/// An empty table comes back unchanged. Names that collide after
/// normalization are disambiguated with `_2`, `_3`, ... suffixes.
pub fn normalize(table: &Table) -> Table {
    if table.is_empty() {
        return table.clone();
    }
    let columns = unique_names(
        table
            .columns()
            .iter()
            .map(|name| normalize_column_name(name))
            .collect(),
    );
    match table.with_columns(columns) {
        Ok(normalized) => normalized,
        // unique_names guarantees distinct names and the rows are untouched
        Err(_) => table.clone(),
    }
}

/// Returns the table column matching the first alias in `candidates`.
///
/// Both sides are compared case-insensitively with all whitespace removed,
/// so "No. Tienda" answers to `no.tienda` and the result does not depend on
/// whether `table` was normalized first. The returned name is the column's
/// actual name in `table`.
pub fn resolve_key<S: AsRef<str>>(table: &Table, candidates: &[S]) -> Option<String> {
    let resolved = candidates.iter().find_map(|alias| {
        let wanted = alias_form(alias.as_ref());
        table
            .columns()
            .iter()
            .find(|column| alias_form(column) == wanted)
            .cloned()
    });
    debug!("Resolved store key column: {resolved:?}");
    resolved
}

fn alias_form(name: &str) -> String {
    name.split_whitespace().collect::<String>().to_lowercase()
}

/// Renames `column` to [`CANONICAL_KEY`].
///
/// A different column already named `no_tienda` is moved aside to the first
/// free `no_tienda_N` so the resolved column keeps the canonical name.
pub fn rename_key(table: &Table, column: &str) -> Result<Table, TableError> {
    if column == CANONICAL_KEY {
        return Ok(table.clone());
    }
    let taken: HashSet<String> = table.columns().iter().cloned().collect();
    let displaced = free_name(CANONICAL_KEY, &taken);
    let columns = table
        .columns()
        .iter()
        .map(|name| {
            if name == column {
                CANONICAL_KEY.to_string()
            } else if name == CANONICAL_KEY {
                displaced.clone()
            } else {
                name.clone()
            }
        })
        .collect();
    table.with_columns(columns)
}
