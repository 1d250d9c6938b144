//! Comma-separated text reader

use super::{clean, dedupe_headers, shape_row};
use crate::error::IngestError;
use crate::types::Document;
use std::io::Cursor;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Text encoding the upload was decoded with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Encoding {
    Utf8,
    Latin1,
}

/// Decode raw upload bytes into text
///
/// UTF-8 is tried first (after removing a BOM). Anything else is read as
/// ISO-8859-1, where every byte is its own code point, so decoding never fails.
pub(super) fn decode(mut bytes: Vec<u8>) -> (String, Encoding) {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }

    match String::from_utf8(bytes) {
        Ok(text) => (text, Encoding::Utf8),
        Err(e) => {
            let text = e.into_bytes().into_iter().map(char::from).collect();
            (text, Encoding::Latin1)
        }
    }
}

/// Lazy row reader over decoded comma-separated text
pub(super) struct DelimitedRows {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
}

impl DelimitedRows {
    pub(super) fn new(bytes: Vec<u8>, filename: &str) -> Result<Self, IngestError> {
        let (text, encoding) = decode(bytes);
        if encoding == Encoding::Latin1 {
            tracing::warn!(filename, "file is not valid UTF-8, decoding as ISO-8859-1");
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(Cursor::new(text.into_bytes()));

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(IngestError::NoHeaders);
        }
        let headers = dedupe_headers(headers);

        Ok(Self {
            headers,
            records: reader.into_records(),
        })
    }

    pub(super) fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for DelimitedRows {
    type Item = Result<Document, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        let cells = (0..self.headers.len())
            .map(|i| clean(record.get(i)))
            .collect();
        Some(Ok(shape_row(&self.headers, cells)))
    }
}
