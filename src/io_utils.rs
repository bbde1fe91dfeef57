//! Parsing of delimited text and spreadsheet workbooks into [`Table`]s.
//!
//! All tabular decoding flows through this module:
//!
//! - **Delimiters**: comma for CSV, tab for TSV.
//! - **Encoding**: input is transcoded to UTF-8 via `encoding_rs_io`, honoring
//!   a byte-order mark when present and falling back to a configured label.
//! - **Workbooks**: xlsx/xls/xlsb/ods are read with `calamine`, one sheet at a
//!   time, first row as header.

use std::io::{Read, Seek};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::{
    data::{Value, text_cell},
    error::LoadError,
    table::{Row, Table},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, LoadError> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| LoadError::UnknownEncoding(value.to_string()))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Reads delimited text, transcoding from `encoding` unless a BOM says otherwise.
pub fn read_delimited<R>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Table, LoadError>
where
    R: Read,
{
    let decoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_override(true)
        .build(reader);
    let mut csv_reader = open_csv_reader(decoded, delimiter);
    let headers = csv_reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let mut rows: Vec<Row> = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_cell).collect());
    }
    Ok(Table::from_raw(headers, rows))
}

/// Reads one sheet of a workbook; the first sheet when `sheet` is `None`.
pub fn read_workbook<RS>(data: RS, sheet: Option<&str>) -> Result<Table, LoadError>
where
    RS: Read + Seek + Clone,
{
    let mut workbook =
        open_workbook_auto_from_rs(data).map_err(|e| LoadError::Workbook(e.to_string()))?;
    let sheet_names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|name| name.as_str() == wanted)
            .cloned()
            .ok_or_else(|| LoadError::MissingSheet(wanted.to_string()))?,
        None => sheet_names.first().cloned().ok_or(LoadError::NoSheets)?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadError::Workbook(format!("sheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::empty());
    };
    let headers = header_row
        .iter()
        .map(|cell| {
            workbook_cell(cell)
                .map(|value| value.as_display())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();
    let rows = rows
        .map(|row| row.iter().map(workbook_cell).collect::<Row>())
        .collect();
    Ok(Table::from_raw(headers, rows))
}

fn workbook_cell(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) => text_cell(s),
        Data::Float(n) => Some(Value::Number(*n)),
        Data::Int(n) => Some(Value::Number(*n as f64)),
        Data::Bool(b) => Some(Value::Text(if *b { "TRUE" } else { "FALSE" }.to_string())),
        // Serial date; callers see the same number the sheet stores
        Data::DateTime(dt) => Some(Value::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
        Data::Error(e) => Some(Value::Text(format!("#{e:?}"))),
    }
}
