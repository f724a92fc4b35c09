//! Bulk import row parsing.
//!
//! Uploaded files are turned into a uniform stream of [`ProductRow`]s no
//! matter which format they arrive in. Each format is a [`RowParser`]
//! strategy; [`parse_rows`] picks one from an [`ImportFormat`].
//!
//! Columns are located by header: an exact case-insensitive match wins,
//! otherwise the first header containing the key is used. The optional `id`
//! column is the exception and must match exactly. Rows with a missing
//! required field or an unusable price are skipped and counted, never fatal.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::types::DbId;

/// Default number of rows written per storage transaction.
pub const IMPORT_BATCH_SIZE: usize = 1000;

const COL_ID: &str = "id";
const COL_NAME: &str = "name";
const COL_PRICE: &str = "price";
const COL_CATEGORY: &str = "category";
const COL_IMAGE: &str = "image";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One normalized product row from an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    /// When present, the row updates the existing product with this id.
    pub id: Option<DbId>,
    pub name: String,
    pub price: f64,
    /// Category name, resolved (or created) case-insensitively on write.
    pub category: String,
    pub image: Option<String>,
}

/// Rows accepted from a file plus the number that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRows {
    pub rows: Vec<ProductRow>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    DelimitedText,
    Spreadsheet,
}

impl ImportFormat {
    /// Choose a format from the uploaded file's extension.
    pub fn from_filename(filename: &str) -> Result<Self, ImportError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(Self::DelimitedText),
            Some("xlsx" | "xls" | "ods") => Ok(Self::Spreadsheet),
            _ => Err(ImportError::UnsupportedFormat(filename.to_string())),
        }
    }

    fn parser(self) -> &'static dyn RowParser {
        match self {
            Self::DelimitedText => &CsvRowParser,
            Self::Spreadsheet => &SpreadsheetRowParser,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not read CSV file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Workbook contains no worksheets")]
    EmptyWorkbook,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Parser strategies
// ---------------------------------------------------------------------------

/// Turns raw file bytes into product rows.
pub trait RowParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedRows, ImportError>;
}

/// Parse `bytes` with the strategy for `format`.
pub fn parse_rows(format: ImportFormat, bytes: &[u8]) -> Result<ParsedRows, ImportError> {
    format.parser().parse(bytes)
}

/// Comma-delimited text with a header row.
pub struct CsvRowParser;

impl RowParser for CsvRowParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedRows, ImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let columns = ColumnMap::resolve(&headers)?;

        let mut parsed = ParsedRows::default();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let cell = |idx: Option<usize>| -> Option<String> {
                idx.and_then(|i| record.get(i))
                    .map(str::to_string)
                    .filter(|v| !v.is_empty())
            };
            let raw = RawRow {
                id: cell(columns.id),
                name: cell(Some(columns.name)),
                price: cell(Some(columns.price)),
                category: cell(Some(columns.category)),
                image: cell(columns.image),
            };
            parsed.push(raw.normalize());
        }
        Ok(parsed)
    }
}

/// First worksheet of an xlsx, xls or ods workbook, header in the first row.
pub struct SpreadsheetRowParser;

impl RowParser for SpreadsheetRowParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedRows, ImportError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ImportError::EmptyWorkbook)??;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(ParsedRows::default());
        };
        let headers: Vec<String> = header_row.iter().map(cell_text).collect();
        let columns = ColumnMap::resolve(&headers)?;

        let mut parsed = ParsedRows::default();
        for row in rows {
            if row.iter().all(|c| matches!(c, Data::Empty)) {
                continue;
            }
            let cell = |idx: Option<usize>| -> Option<String> {
                idx.and_then(|i| row.get(i))
                    .map(cell_text)
                    .filter(|v| !v.is_empty())
            };
            let raw = RawRow {
                id: cell(columns.id),
                name: cell(Some(columns.name)),
                price: cell(Some(columns.price)),
                category: cell(Some(columns.category)),
                image: cell(columns.image),
            };
            parsed.push(raw.normalize());
        }
        Ok(parsed)
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Column resolution and row normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    id: Option<usize>,
    name: usize,
    price: usize,
    category: usize,
    image: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<Self, ImportError> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();

        let find = |key: &str| -> Option<usize> {
            normalized
                .iter()
                .position(|h| h == key)
                .or_else(|| normalized.iter().position(|h| h.contains(key)))
        };

        // A matched id column turns rows into updates, so it must match exactly.
        let id = normalized.iter().position(|h| h == COL_ID);

        let name = find(COL_NAME);
        let price = find(COL_PRICE);
        let category = find(COL_CATEGORY);

        match (name, price, category) {
            (Some(name), Some(price), Some(category)) => Ok(Self {
                id,
                name,
                price,
                category,
                image: find(COL_IMAGE),
            }),
            _ => {
                let missing = [(COL_NAME, name), (COL_PRICE, price), (COL_CATEGORY, category)]
                    .into_iter()
                    .filter(|(_, idx)| idx.is_none())
                    .map(|(key, _)| key)
                    .collect();
                Err(ImportError::MissingColumns(missing))
            }
        }
    }
}

struct RawRow {
    id: Option<String>,
    name: Option<String>,
    price: Option<String>,
    category: Option<String>,
    image: Option<String>,
}

impl RawRow {
    fn normalize(self) -> Option<ProductRow> {
        let name = self.name?;
        let category = self.category?;
        let price = self.price?.parse::<f64>().ok()?;
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        Some(ProductRow {
            id: self.id.and_then(|v| v.parse::<DbId>().ok()),
            name,
            price,
            category,
            image: self.image,
        })
    }
}

impl ParsedRows {
    fn push(&mut self, row: Option<ProductRow>) {
        match row {
            Some(row) => self.rows.push(row),
            None => self.skipped += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
