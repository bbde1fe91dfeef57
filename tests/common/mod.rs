#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use store_lookup::{data::Value, table::Table};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a single-sheet workbook; `rows[0]` is the header.
    pub fn write_workbook(&self, name: &str, sheet: &str, rows: &[&[&str]]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, workbook_bytes(sheet, rows)).expect("write workbook");
        path
    }
}

/// An xlsx file in memory. Body cells that parse as numbers are written as numbers.
pub fn workbook_bytes(sheet: &str, rows: &[&[&str]]) -> Vec<u8> {
    multi_sheet_workbook_bytes(&[(sheet, rows)])
}

/// Like [`workbook_bytes`] with one worksheet per `(name, rows)` pair, in order.
pub fn multi_sheet_workbook_bytes(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (sheet, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*sheet).expect("sheet name");
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match cell.parse::<f64>() {
                    Ok(number) if r > 0 => {
                        worksheet.write_number(r, c, number).expect("write number");
                    }
                    _ => {
                        worksheet.write_string(r, c, *cell).expect("write string");
                    }
                }
            }
        }
    }
    workbook.save_to_buffer().expect("serialize workbook")
}

pub fn text(value: &str) -> Option<Value> {
    Some(Value::from(value))
}

pub fn number(value: f64) -> Option<Value> {
    Some(Value::Number(value))
}

pub fn table(columns: &[&str], rows: Vec<Vec<Option<Value>>>) -> Table {
    Table::new(columns.iter().map(|c| c.to_string()).collect(), rows).expect("valid table")
}
