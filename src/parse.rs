//! Reads a CSV file into an owned header + raw-row accumulator.

use std::path::Path;

use encoding_rs::Encoding;

use crate::error::IngestError;
use crate::io_utils;

/// Every data row of a file, aligned to the original header row.
///
/// Rows shorter than the header are padded with empty strings; cells beyond
/// the header count are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedCsv {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column in row order.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).map(String::as_str).unwrap_or(""))
    }

    fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
    }
}

pub fn read_csv<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<ParsedCsv, IngestError> {
    let headers = io_utils::reader_headers(&mut reader, encoding).map_err(|err| {
        IngestError::Decode {
            row: 1,
            message: err.to_string(),
        }
    })?;
    let mut parsed = ParsedCsv {
        headers,
        rows: Vec::new(),
    };

    let mut record = csv::ByteRecord::new();
    let mut line = 1usize;
    while reader.read_byte_record(&mut record)? {
        line += 1;
        let cells = io_utils::decode_record(&record, encoding).map_err(|err| IngestError::Decode {
            row: line,
            message: err.to_string(),
        })?;
        parsed.push_row(cells);
    }
    Ok(parsed)
}

pub fn read_csv_file(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<ParsedCsv, IngestError> {
    let file = std::fs::File::open(path)?;
    let reader = io_utils::open_csv_reader(std::io::BufReader::new(file), delimiter);
    read_csv(reader, encoding)
}
