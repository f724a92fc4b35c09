//! Product report encoders.
//!
//! A [`ReportEncoder`] turns batches of [`ReportRecord`]s into bytes that can
//! be flushed to a streaming sink as soon as each batch is encoded. CSV output
//! is emitted batch by batch. Spreadsheet output is an Office Open XML
//! workbook whose sheet rows are spooled into a zip archive on disk and handed
//! back as a reader once the archive is complete, because the zip central
//! directory can only be written after the last row.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Column headers shared by every report format.
pub const REPORT_HEADERS: [&str; 6] = ["ID", "Name", "Price", "Category", "Image", "Created At"];

/// Default number of products read per export batch.
pub const EXPORT_BATCH_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Csv,
    Xlsx,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// `Content-Disposition` value for a download of this report.
    pub fn attachment_header(self) -> String {
        format!("attachment; filename=\"products.{}\"", self.as_str())
    }

    /// Create a fresh encoder for one export run.
    pub fn encoder(self) -> Result<Box<dyn ReportEncoder>, ReportError> {
        Ok(match self {
            Self::Csv => Box::new(CsvReportEncoder),
            Self::Xlsx => Box::new(XlsxReportEncoder::new()?),
        })
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(CoreError::Validation(format!(
                "Unknown report format '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records and errors
// ---------------------------------------------------------------------------

/// One product line of a report.
#[derive(Debug, Clone, Copy)]
pub struct ReportRecord<'a> {
    pub id: DbId,
    pub name: &'a str,
    pub price: f64,
    pub category: &'a str,
    pub image: Option<&'a str>,
    pub created_at: Timestamp,
}

impl ReportRecord<'_> {
    fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Encoder seam
// ---------------------------------------------------------------------------

/// Incremental report encoder.
///
/// Every method returns the bytes that are ready to be sent now; an empty
/// buffer means nothing is ready yet.
pub trait ReportEncoder: Send {
    /// Preamble (header row, archive parts).
    fn begin(&mut self) -> Result<Vec<u8>, ReportError>;

    /// Encode one batch of records.
    fn write_batch(&mut self, records: &[ReportRecord<'_>]) -> Result<Vec<u8>, ReportError>;

    /// Close the document and return a reader over any remaining bytes.
    fn finish(self: Box<Self>) -> Result<Box<dyn Read + Send>, ReportError>;
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// RFC 4180 CSV, flushed per batch.
pub struct CsvReportEncoder;

impl CsvReportEncoder {
    fn encode<F>(fill: F) -> Result<Vec<u8>, ReportError>
    where
        F: FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<(), csv::Error>,
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        fill(&mut writer)?;
        writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}

impl ReportEncoder for CsvReportEncoder {
    fn begin(&mut self) -> Result<Vec<u8>, ReportError> {
        Self::encode(|w| w.write_record(REPORT_HEADERS))
    }

    fn write_batch(&mut self, records: &[ReportRecord<'_>]) -> Result<Vec<u8>, ReportError> {
        Self::encode(|w| {
            for record in records {
                w.write_record([
                    record.id.to_string(),
                    record.name.to_string(),
                    record.price.to_string(),
                    record.category.to_string(),
                    record.image.unwrap_or_default().to_string(),
                    record.created_at_iso(),
                ])?;
            }
            Ok(())
        })
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn Read + Send>, ReportError> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"</Types>"#,
);

const ROOT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const WORKBOOK_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<sheets><sheet name="Products" sheetId="1" r:id="rId1"/></sheets>"#,
    r#"</workbook>"#,
);

const WORKBOOK_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"</Relationships>"#,
);

const SHEET_OPEN_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
);

const SHEET_CLOSE_XML: &str = "</sheetData></worksheet>";

const COLUMNS: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

enum Cell<'a> {
    Number(String),
    Text(&'a str),
}

/// Office Open XML workbook with a single `Products` sheet.
///
/// Rows are deflated into an anonymous temp file as batches arrive, so memory
/// use is bounded by one batch regardless of catalog size.
pub struct XlsxReportEncoder {
    archive: ZipWriter<File>,
    next_row: u64,
}

impl XlsxReportEncoder {
    pub fn new() -> Result<Self, ReportError> {
        let spool = tempfile::tempfile()?;
        Ok(Self {
            archive: ZipWriter::new(spool),
            next_row: 1,
        })
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    fn write_row(&mut self, cells: &[Cell<'_>]) -> Result<(), ReportError> {
        let row = self.next_row;
        self.next_row += 1;

        let mut xml = format!(r#"<row r="{row}">"#);
        for (column, cell) in COLUMNS.iter().zip(cells) {
            match cell {
                Cell::Number(value) => {
                    xml.push_str(&format!(r#"<c r="{column}{row}"><v>{value}</v></c>"#));
                }
                Cell::Text(value) => {
                    xml.push_str(&format!(
                        r#"<c r="{column}{row}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape_xml(value)
                    ));
                }
            }
        }
        xml.push_str("</row>");
        self.archive.write_all(xml.as_bytes())?;
        Ok(())
    }
}

impl ReportEncoder for XlsxReportEncoder {
    fn begin(&mut self) -> Result<Vec<u8>, ReportError> {
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", ROOT_RELS_XML),
            ("xl/workbook.xml", WORKBOOK_XML),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ];
        for (name, body) in parts {
            self.archive.start_file(name, Self::options())?;
            self.archive.write_all(body.as_bytes())?;
        }

        self.archive
            .start_file("xl/worksheets/sheet1.xml", Self::options())?;
        self.archive.write_all(SHEET_OPEN_XML.as_bytes())?;

        let headers = REPORT_HEADERS.map(Cell::Text);
        self.write_row(&headers)?;
        Ok(Vec::new())
    }

    fn write_batch(&mut self, records: &[ReportRecord<'_>]) -> Result<Vec<u8>, ReportError> {
        for record in records {
            let created_at = record.created_at_iso();
            let cells = [
                Cell::Number(record.id.to_string()),
                Cell::Text(record.name),
                Cell::Number(record.price.to_string()),
                Cell::Text(record.category),
                Cell::Text(record.image.unwrap_or_default()),
                Cell::Text(&created_at),
            ];
            self.write_row(&cells)?;
        }
        Ok(Vec::new())
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn Read + Send>, ReportError> {
        let mut archive = self.archive;
        archive.write_all(SHEET_CLOSE_XML.as_bytes())?;
        let mut spool = archive.finish()?;
        spool.seek(SeekFrom::Start(0))?;
        Ok(Box::new(spool))
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // Control characters other than tab/newline are not legal XML 1.0.
            c if c.is_control() && c != '\t' && c != '\n' && c != '\r' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::import::{parse_rows, ImportFormat};

    fn created_at() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn records() -> Vec<ReportRecord<'static>> {
        vec![
            ReportRecord {
                id: 1,
                name: "Desk \"Pro\" lamp",
                price: 24.5,
                category: "Lighting, Indoor",
                image: Some("https://img.example.com/lamp.png"),
                created_at: created_at(),
            },
            ReportRecord {
                id: 2,
                name: "Chair",
                price: 80.0,
                category: "Furniture",
                image: None,
                created_at: created_at(),
            },
        ]
    }

    fn drain(reader: &mut dyn Read) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn csv_encodes_header_and_quoted_rows() {
        let mut encoder = ReportFormat::Csv.encoder().unwrap();
        let mut out = encoder.begin().unwrap();
        out.extend(encoder.write_batch(&records()).unwrap());
        out.extend(drain(&mut *encoder.finish().unwrap()));

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID,Name,Price,Category,Image,Created At");
        assert_eq!(
            lines[1],
            r#"1,"Desk ""Pro"" lamp",24.5,"Lighting, Indoor",https://img.example.com/lamp.png,2026-03-14T09:26:53.000Z"#
        );
        assert_eq!(lines[2], "2,Chair,80,Furniture,,2026-03-14T09:26:53.000Z");
    }

    #[test]
    fn csv_batches_are_flushed_independently() {
        let mut encoder = CsvReportEncoder;
        let first = encoder.write_batch(&records()[..1]).unwrap();
        let second = encoder.write_batch(&records()[1..]).unwrap();
        assert!(String::from_utf8(first).unwrap().starts_with("1,"));
        assert!(String::from_utf8(second).unwrap().starts_with("2,"));
    }

    #[test]
    fn xlsx_output_is_a_readable_workbook() {
        let mut encoder = ReportFormat::Xlsx.encoder().unwrap();
        assert!(encoder.begin().unwrap().is_empty());
        assert!(encoder.write_batch(&records()).unwrap().is_empty());
        let bytes = drain(&mut *encoder.finish().unwrap());

        // Zip local file header magic.
        assert_eq!(&bytes[..4], b"PK\x03\x04");

        // The sheet reads back through the import parser.
        let parsed = parse_rows(ImportFormat::Spreadsheet, &bytes).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].id, Some(1));
        assert_eq!(parsed.rows[0].name, "Desk \"Pro\" lamp");
        assert_eq!(parsed.rows[0].category, "Lighting, Indoor");
        assert_eq!(parsed.rows[1].price, 80.0);
        assert_eq!(parsed.rows[1].image, None);
    }

    #[test]
    fn escape_xml_handles_markup_and_controls() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }

    #[test]
    fn format_metadata() {
        assert_eq!(ReportFormat::Csv.as_str(), "csv");
        assert_eq!(
            ReportFormat::Xlsx.attachment_header(),
            "attachment; filename=\"products.xlsx\""
        );
        assert_eq!("xlsx".parse::<ReportFormat>().unwrap(), ReportFormat::Xlsx);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
