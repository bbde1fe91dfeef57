//! Source descriptors and the loader that turns them into tables.
//!
//! A [`SourceDescriptor`] names a local spreadsheet file or a remote export URL
//! plus an optional sheet selector. [`Loader::load`] makes a single attempt to
//! fetch and parse it and returns an empty [`Table`] on any failure, so callers
//! only ever deal with one "nothing here" state. [`Loader::load_outcome`] keeps
//! the failure reason for callers that want to report it.

use std::{
    fmt,
    fs::File,
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::anyhow;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{error::LoadError, io_utils, table::Table};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The datasets a deployment joins, in join preference order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    PointsOfSale,
    Sales,
    Promotions,
    GiftVouchers,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::PointsOfSale,
        SourceKind::Sales,
        SourceKind::Promotions,
        SourceKind::GiftVouchers,
    ];

    /// Suffix used when this source's column collides with an earlier one.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::PointsOfSale => "points_of_sale",
            SourceKind::Sales => "sales",
            SourceKind::Promotions => "promotions",
            SourceKind::GiftVouchers => "gift_vouchers",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match wanted.as_str() {
            "points_of_sale" | "pos" | "tiendas" => Ok(SourceKind::PointsOfSale),
            "sales" | "ventas" => Ok(SourceKind::Sales),
            "promotions" | "promos" | "promociones" => Ok(SourceKind::Promotions),
            "gift_vouchers" | "vouchers" | "vales" => Ok(SourceKind::GiftVouchers),
            _ => Err(anyhow!(
                "Unknown source kind '{value}' (expected points_of_sale, sales, promotions or gift_vouchers)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Tsv,
    Workbook,
}

impl SourceFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Some(SourceFormat::Csv),
            "tsv" => Some(SourceFormat::Tsv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(SourceFormat::Workbook),
            _ => None,
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            SourceFormat::Tsv => io_utils::DEFAULT_TSV_DELIMITER,
            _ => io_utils::DEFAULT_CSV_DELIMITER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Location {
    Url(String),
    Path(PathBuf),
}

impl Location {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Location::Url(trimmed.to_string())
        } else {
            Location::Path(PathBuf::from(trimmed))
        }
    }
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        Location::parse(&value)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Url(url) => f.write_str(url),
            Location::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Identifies one tabular dataset. Also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub location: Location,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub format: Option<SourceFormat>,
}

impl SourceDescriptor {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            sheet: None,
            format: None,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Explicit format, else file extension, else the URL's `format=` parameter, else CSV.
    pub fn resolved_format(&self) -> SourceFormat {
        if let Some(format) = self.format {
            return format;
        }
        match &self.location {
            Location::Path(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(SourceFormat::from_extension)
                .unwrap_or(SourceFormat::Csv),
            Location::Url(url) => url_format(url).unwrap_or(SourceFormat::Csv),
        }
    }

    /// The URL actually requested for a remote source.
    pub fn request_url(&self) -> Option<String> {
        match &self.location {
            Location::Url(url) => Some(google_sheets_export_url(
                url,
                self.sheet.as_deref(),
                self.resolved_format(),
            )),
            Location::Path(_) => None,
        }
    }

    /// Format the fetched bytes are parsed as. A rewritten Google Sheets URL
    /// names its own export format, which wins over the original link.
    fn request_format(&self, request_url: &str) -> SourceFormat {
        let format = self.resolved_format();
        match &self.location {
            Location::Url(url) if url != request_url => url_format(request_url).unwrap_or(format),
            _ => format,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)?;
        if let Some(sheet) = &self.sheet {
            write!(f, "#{sheet}")?;
        }
        Ok(())
    }
}

/// Parses `location[#sheet]`.
impl FromStr for SourceDescriptor {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Source location cannot be empty"));
        }
        let (location, sheet) = match trimmed.rsplit_once('#') {
            // `#gid=N` is a Google Sheets tab anchor, not a sheet name
            Some((location, sheet)) if !sheet.trim().is_empty() && !sheet.starts_with("gid=") => {
                (location, Some(sheet.trim().to_string()))
            }
            _ => (trimmed, None),
        };
        let mut descriptor = SourceDescriptor::new(Location::parse(location));
        descriptor.sheet = sheet;
        Ok(descriptor)
    }
}

/// Either a loaded table or the reason there is none.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Table),
    Failed(LoadError),
}

impl LoadOutcome {
    /// Collapses a failure into the empty table.
    pub fn into_table(self) -> Table {
        match self {
            LoadOutcome::Loaded(table) => table,
            LoadOutcome::Failed(_) => Table::empty(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadOutcome::Failed(_))
    }
}

impl From<Result<Table, LoadError>> for LoadOutcome {
    fn from(result: Result<Table, LoadError>) -> Self {
        match result {
            Ok(table) => LoadOutcome::Loaded(table),
            Err(err) => LoadOutcome::Failed(err),
        }
    }
}

/// Fetches and parses sources. One attempt per call, no retries.
#[derive(Debug, Clone)]
pub struct Loader {
    http: reqwest::blocking::Client,
    encoding: &'static Encoding,
}

impl Loader {
    pub fn new(timeout: Duration, encoding: &'static Encoding) -> Result<Self, LoadError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("store-lookup/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Network {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { http, encoding })
    }

    pub fn with_defaults() -> Result<Self, LoadError> {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS), UTF_8)
    }

    /// Loads `descriptor`, substituting an empty table for any failure.
    pub fn load(&self, descriptor: &SourceDescriptor) -> Table {
        self.load_outcome(descriptor).into_table()
    }

    pub fn load_outcome(&self, descriptor: &SourceDescriptor) -> LoadOutcome {
        let outcome = LoadOutcome::from(self.try_load(descriptor));
        match &outcome {
            LoadOutcome::Loaded(table) => info!(
                "Loaded {} row(s) x {} column(s) from {}",
                table.row_count(),
                table.column_count(),
                descriptor
            ),
            LoadOutcome::Failed(err) => warn!("Failed to load {descriptor}: {err}"),
        }
        outcome
    }

    pub fn try_load(&self, descriptor: &SourceDescriptor) -> Result<Table, LoadError> {
        match &descriptor.location {
            Location::Path(path) => self.load_path(
                path,
                descriptor.resolved_format(),
                descriptor.sheet.as_deref(),
            ),
            Location::Url(_) => {
                let url = descriptor
                    .request_url()
                    .unwrap_or_else(|| descriptor.location.to_string());
                let format = descriptor.request_format(&url);
                self.load_url(&url, format, descriptor.sheet.as_deref())
            }
        }
    }

    fn load_path(
        &self,
        path: &Path,
        format: SourceFormat,
        sheet: Option<&str>,
    ) -> Result<Table, LoadError> {
        debug!("Reading {format:?} source from {path:?}");
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        match format {
            SourceFormat::Workbook => {
                let bytes = std::fs::read(path).map_err(io_err)?;
                io_utils::read_workbook(Cursor::new(bytes), sheet)
            }
            SourceFormat::Csv | SourceFormat::Tsv => {
                let file = File::open(path).map_err(io_err)?;
                io_utils::read_delimited(BufReader::new(file), format.delimiter(), self.encoding)
            }
        }
    }

    fn load_url(
        &self,
        url: &str,
        format: SourceFormat,
        sheet: Option<&str>,
    ) -> Result<Table, LoadError> {
        debug!("Fetching {format:?} source from {url}");
        let response = self.http.get(url).send().map_err(|e| LoadError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type.starts_with("text/html") {
            return Err(LoadError::NotTabular {
                url: url.to_string(),
                content_type,
            });
        }

        let bytes = response.bytes().map_err(|e| LoadError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        match format {
            SourceFormat::Workbook => io_utils::read_workbook(Cursor::new(bytes.to_vec()), sheet),
            // Remote exports are always UTF-8
            SourceFormat::Csv | SourceFormat::Tsv => {
                io_utils::read_delimited(bytes.as_ref(), format.delimiter(), UTF_8)
            }
        }
    }
}

/// Format named by a URL's `format`, `output` or `tqx=out:` query parameter,
/// else by the extension of its last path segment.
fn url_format(url: &str) -> Option<SourceFormat> {
    let parsed = Url::parse(url).ok()?;
    let from_query = parsed
        .query_pairs()
        .find_map(|(name, value)| match &*name {
            "format" | "output" => SourceFormat::from_extension(&value),
            "tqx" => value
                .strip_prefix("out:")
                .and_then(SourceFormat::from_extension),
            _ => None,
        });
    from_query.or_else(|| {
        parsed
            .path_segments()?
            .last()?
            .rsplit_once('.')
            .and_then(|(_, ext)| SourceFormat::from_extension(ext))
    })
}

/// Id of a Google Sheets document from a `/spreadsheets/d/<id>/...` path.
fn spreadsheet_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    match (segments.next(), segments.next(), segments.next()) {
        (Some("spreadsheets"), Some("d"), Some(id)) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}

/// Rewrites Google Sheets links into export URLs for `format`.
///
/// A workbook is always fetched whole from `/export?format=xlsx`; its sheet is
/// picked after download. A CSV request with a sheet selector goes to the
/// `gviz` endpoint for that sheet. Without a selector, edit and view links
/// become `/export?format=csv` (or `tsv`) and links that already point at an
/// export are kept. Other URLs are returned unchanged.
pub fn google_sheets_export_url(url: &str, sheet: Option<&str>, format: SourceFormat) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(id) = spreadsheet_id(&parsed) else {
        return url.to_string();
    };
    let already_export = parsed
        .path_segments()
        .and_then(|mut segments| segments.nth(3))
        .is_some_and(|action| action == "export" || action == "gviz");
    parsed.set_fragment(None);
    match (format, sheet) {
        (SourceFormat::Workbook, _) => {
            parsed.set_path(&format!("/spreadsheets/d/{id}/export"));
            parsed
                .query_pairs_mut()
                .clear()
                .append_pair("format", "xlsx");
        }
        (_, Some(sheet)) => {
            parsed.set_path(&format!("/spreadsheets/d/{id}/gviz/tq"));
            parsed
                .query_pairs_mut()
                .clear()
                .append_pair("tqx", "out:csv")
                .append_pair("sheet", sheet);
        }
        (_, None) if already_export => return url.to_string(),
        (format, None) => {
            let label = if format == SourceFormat::Tsv { "tsv" } else { "csv" };
            parsed.set_path(&format!("/spreadsheets/d/{id}/export"));
            parsed
                .query_pairs_mut()
                .clear()
                .append_pair("format", label);
        }
    }
    parsed.into()
}
