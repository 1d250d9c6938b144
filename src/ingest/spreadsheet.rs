//! Excel workbook reader (first worksheet only)

use super::{clean_cell, dedupe_headers, shape_row};
use crate::error::IngestError;
use crate::types::Document;
use calamine::{Data, Range, Reader};
use std::io::Cursor;

/// Header name for a column whose header cell is blank
fn header_name(cell: Option<&Data>, index: usize) -> String {
    match cell {
        Some(Data::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Data::Empty) | Some(Data::String(_)) | None => format!("Unnamed: {index}"),
        Some(other) => clean_cell(other),
    }
}

/// Row reader over the first worksheet of a workbook
///
/// The whole sheet is loaded into a cell range up front. Rows in which every cell
/// is empty are skipped.
pub(super) struct SpreadsheetRows {
    range: Range<Data>,
    headers: Vec<String>,
    next_row: usize,
}

impl SpreadsheetRows {
    pub(super) fn new(bytes: Vec<u8>) -> Result<Self, IngestError> {
        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range?,
            None => return Err(IngestError::NoHeaders),
        };
        if range.is_empty() {
            return Err(IngestError::NoHeaders);
        }

        let headers = dedupe_headers(
            (0..range.width())
                .map(|col| header_name(range.get((0, col)), col))
                .collect(),
        );

        Ok(Self {
            range,
            headers,
            next_row: 1,
        })
    }

    pub(super) fn headers(&self) -> &[String] {
        &self.headers
    }

    fn row_is_blank(&self, row: usize) -> bool {
        (0..self.headers.len())
            .all(|col| matches!(self.range.get((row, col)), None | Some(Data::Empty)))
    }
}

impl Iterator for SpreadsheetRows {
    type Item = Result<Document, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_row < self.range.height() {
            let row = self.next_row;
            self.next_row += 1;

            if self.row_is_blank(row) {
                continue;
            }

            let cells = (0..self.headers.len())
                .map(|col| self.range.get((row, col)).map(clean_cell).unwrap_or_default())
                .collect();
            return Some(Ok(shape_row(&self.headers, cells)));
        }
        None
    }
}
