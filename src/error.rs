use std::path::PathBuf;

use thiserror::Error;

/// Why a table could not be constructed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("row {row} has {found} cell(s), expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Why a source could not be loaded.
///
/// These never escape the loader's public `load`; they are logged and
/// replaced by an empty table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("opening {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("request to {url} returned HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("{url} returned {content_type} instead of tabular data")]
    NotTabular { url: String, content_type: String },
    #[error("parsing CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("reading workbook: {0}")]
    Workbook(String),
    #[error("sheet '{0}' not found")]
    MissingSheet(String),
    #[error("workbook contains no sheets")]
    NoSheets,
    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),
    #[error("loader thread panicked")]
    Panicked,
}
