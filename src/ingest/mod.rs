//! File ingestion: decoding uploads into lazy sequences of document batches.
//!
//! [`BatchProducer`] is the entry point. It dispatches on the filename suffix to a
//! row reader ([`delimited`] or [`spreadsheet`]), shapes every row into a
//! [`Document`], and groups documents into batches of at most `batch_size`.
//!
//! The producer is a plain [`Iterator`]: it is pulled one batch at a time, is
//! finite, and cannot be restarted. It stops after the first error.

mod cleaner;
mod delimited;
mod spreadsheet;

pub use cleaner::{clean, clean_cell};

use crate::error::IngestError;
use crate::types::{Batch, Document, ID_FIELD};
use delimited::DelimitedRows;
use spreadsheet::SpreadsheetRows;
use std::collections::HashMap;

/// Filename suffixes accepted for upload
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".csv", ".xlsx", ".xls"];

/// Input format, derived from the filename suffix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated text
    Delimited,
    /// Excel workbook (`.xlsx` or legacy `.xls`)
    Spreadsheet,
}

impl FileFormat {
    /// Detect the format from a filename, case-insensitively
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Some(FileFormat::Delimited)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Some(FileFormat::Spreadsheet)
        } else {
            None
        }
    }
}

/// Make header names unique by suffixing repeats with `.1`, `.2`, ...
///
/// A generated name that collides with a later literal header is suffixed again
/// (`["a", "a", "a.1"]` becomes `["a", "a.1", "a.1.1"]`).
pub(crate) fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|header| {
            let mut name = header;
            let mut seen = counts.get(&name).copied().unwrap_or(0);
            while seen > 0 {
                counts.insert(name.clone(), seen + 1);
                name = format!("{name}.{seen}");
                seen = counts.get(&name).copied().unwrap_or(0);
            }
            counts.insert(name.clone(), 1);
            name
        })
        .collect()
}

/// Build a document from one row
///
/// `cells` holds the already-cleaned values in header order; it may be shorter than
/// `headers` (missing cells become `""`). The identifier field is set last, so a
/// column named like [`ID_FIELD`] is overwritten by the first column's value.
pub(crate) fn shape_row(headers: &[String], mut cells: Vec<String>) -> Document {
    cells.resize(headers.len(), String::new());
    let id = cells.first().cloned().unwrap_or_default();

    let mut document: Document = headers.iter().cloned().zip(cells).collect();
    document.insert(ID_FIELD, id);
    document
}

/// Row source shared by both formats
enum Rows {
    Delimited(DelimitedRows),
    Spreadsheet(SpreadsheetRows),
}

impl Iterator for Rows {
    type Item = Result<Document, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Rows::Delimited(rows) => rows.next(),
            Rows::Spreadsheet(rows) => rows.next(),
        }
    }
}

/// Lazy, single-pass producer of document batches
///
/// # Examples
///
/// ```
/// use bulk_load::ingest::BatchProducer;
///
/// let csv = b"id,name\n1,Ann\n2,Bo\n3,Cy\n".to_vec();
/// let batches: Vec<_> = BatchProducer::new(csv, "people.csv", 2)
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
///
/// assert_eq!(batches.len(), 2);
/// assert_eq!(batches[0][1].get("name"), Some("Bo"));
/// assert_eq!(batches[1][0].id(), Some("3"));
/// ```
pub struct BatchProducer {
    rows: Rows,
    headers: Vec<String>,
    batch_size: usize,
    rows_read: u64,
    batches_yielded: u64,
    finished: bool,
}

impl BatchProducer {
    /// Decode `bytes` according to `filename` and prepare batch production
    ///
    /// The header row is read here, so an unsupported suffix, an undecodable file
    /// or a missing header fails before any batch is requested. A `batch_size` of 0
    /// is treated as 1.
    pub fn new(
        bytes: Vec<u8>,
        filename: &str,
        batch_size: usize,
    ) -> Result<Self, IngestError> {
        let format =
            FileFormat::from_filename(filename).ok_or_else(|| IngestError::UnsupportedFormat {
                filename: filename.to_string(),
            })?;

        let (rows, headers) = match format {
            FileFormat::Delimited => {
                let rows = DelimitedRows::new(bytes, filename)?;
                let headers = rows.headers().to_vec();
                (Rows::Delimited(rows), headers)
            }
            FileFormat::Spreadsheet => {
                let rows = SpreadsheetRows::new(bytes)?;
                let headers = rows.headers().to_vec();
                (Rows::Spreadsheet(rows), headers)
            }
        };

        tracing::debug!(
            filename,
            ?format,
            columns = headers.len(),
            identifier_column = %headers[0],
            "file decoded"
        );

        Ok(Self {
            rows,
            headers,
            batch_size: batch_size.max(1),
            rows_read: 0,
            batches_yielded: 0,
            finished: false,
        })
    }

    /// Header row in declaration order; the first entry is the identifier column
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows turned into documents so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

impl Iterator for BatchProducer {
    type Item = Result<Batch, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.rows.next() {
                Some(Ok(document)) => {
                    self.rows_read += 1;
                    batch.push(document);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            tracing::debug!(rows = self.rows_read, "all rows read");
            return None;
        }

        self.batches_yielded += 1;
        tracing::debug!(
            batch = self.batches_yielded,
            size = batch.len(),
            "batch ready"
        );
        Some(Ok(batch))
    }
}
