//! Plain-text rendering for the terminal front end.
//!
//! Every cell goes through [`fit_cell`] before layout, so widths are plain
//! character counts: control characters become spaces and long values are
//! cut at [`MAX_CELL_WIDTH`].

use std::fmt::Write as _;

use itertools::Itertools;

use crate::{
    data::display_cell,
    lookup::Record,
    pipeline::Snapshot,
    table::Table,
};

/// Cells wider than this are truncated with an ellipsis.
pub const MAX_CELL_WIDTH: usize = 40;
const MIN_COLUMN_WIDTH: usize = 3;
const COLUMN_GAP: &str = "  ";
const RECORD_GAP: &str = "    ";

/// Aligned columns with a dashed separator under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| fit_cell(h)).collect_vec();
    let rows = rows
        .iter()
        .map(|row| row.iter().take(headers.len()).map(|c| fit_cell(c)).collect_vec())
        .collect_vec();

    let mut widths = headers.iter().map(|h| width_of(h)).collect_vec();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(width_of(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(MIN_COLUMN_WIDTH);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", pad_row(&headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect_vec();
    let _ = writeln!(output, "{}", pad_row(&separator, &widths));
    for row in &rows {
        let _ = writeln!(output, "{}", pad_row(row, &widths));
    }
    output
}

pub fn render_records(columns: &[String], records: &[Record<'_>]) -> String {
    let rows = records
        .iter()
        .map(Record::display_cells)
        .collect::<Vec<_>>();
    render_table(columns, &rows)
}

pub fn render_full_table(table: &Table) -> String {
    let rows = table
        .rows()
        .iter()
        .map(|row| row.iter().map(display_cell).collect())
        .collect::<Vec<_>>();
    render_table(table.columns(), &rows)
}

/// A store's fields as `name: value` pairs in two side-by-side halves. The
/// left half takes the extra field when the count is odd.
pub fn render_record(record: &Record<'_>) -> String {
    let lines = record
        .fields()
        .map(|(name, value)| {
            let value = value.map(|v| v.as_display()).unwrap_or_default();
            format!("{}: {}", fit_cell(name), fit_cell(&value))
        })
        .collect_vec();
    let (left, right) = lines.split_at(lines.len().div_ceil(2));
    let left_width = left.iter().map(|l| width_of(l)).max().unwrap_or(0);

    let mut output = String::new();
    for (idx, left_line) in left.iter().enumerate() {
        let line = match right.get(idx) {
            Some(right_line) => format!(
                "{left_line}{}{RECORD_GAP}{right_line}",
                " ".repeat(left_width - width_of(left_line))
            ),
            None => left_line.clone(),
        };
        let _ = writeln!(output, "{}", line.trim_end());
    }
    output
}

pub fn render_summary(snapshot: &Snapshot) -> String {
    let reconciliation = &snapshot.reconciliation;
    let mut output = String::new();
    if reconciliation.unified.is_empty() {
        let _ = writeln!(output, "No data available.");
    } else {
        let summary = &reconciliation.summary;
        let _ = writeln!(output, "Stores:             {}", summary.total);
        let _ = writeln!(output, "With promotions:    {}", summary.with_promos);
        let _ = writeln!(output, "Without sales:      {}", summary.without_sales);
    }
    if !snapshot.sources.is_empty() {
        let _ = writeln!(output);
        let headers = ["source", "rows", "refreshed", "location"]
            .map(String::from)
            .to_vec();
        let rows = snapshot
            .sources
            .iter()
            .map(|status| {
                vec![
                    status.kind.to_string(),
                    if status.loaded {
                        status.rows.to_string()
                    } else {
                        "failed".to_string()
                    },
                    status.refreshed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    status.location.clone(),
                ]
            })
            .collect::<Vec<_>>();
        output.push_str(&render_table(&headers, &rows));
    }
    if !reconciliation.warnings.is_empty() {
        let _ = writeln!(output);
        for warning in &reconciliation.warnings {
            let _ = writeln!(output, "warning: {warning}");
        }
    }
    output
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell}{}", " ".repeat(width.saturating_sub(width_of(cell)))))
        .join(COLUMN_GAP)
        .trim_end()
        .to_string()
}

fn width_of(value: &str) -> usize {
    value.chars().count()
}

/// Single-line, length-capped form of a cell.
fn fit_cell(value: &str) -> String {
    let line = value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect::<String>();
    if width_of(&line) <= MAX_CELL_WIDTH {
        return line;
    }
    let mut cut = line.chars().take(MAX_CELL_WIDTH - 1).collect::<String>();
    cut.push('…');
    cut
}
