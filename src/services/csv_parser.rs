//! Streaming CSV parser for contact imports
//!
//! Reads one record at a time from any `Read` source; the file is never
//! loaded whole. Format:
//! - first non-blank line is the header, matched case-insensitively
//! - `email` column is mandatory, `first_name` / `last_name` optional,
//!   any other column (e.g. `tags`) is ignored
//! - comma-delimited, quotes are literal characters (no escaping)
//! - blank lines are skipped

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use csv::{ByteRecord, ReaderBuilder};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::types::{ParsedRow, RowError};

/// Structural error that aborts the whole import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV must include an email column")]
    MissingEmailColumn,
    #[error("CSV file is empty")]
    EmptyFile,
    #[error("Failed to read CSV file")]
    Io(#[from] std::io::Error),
    #[error("Malformed CSV")]
    Csv(#[from] csv::Error),
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderColumns {
    pub email: usize,
    pub first_name: Option<usize>,
    pub last_name: Option<usize>,
}

impl HeaderColumns {
    pub fn from_record(header: &ByteRecord) -> Result<Self, ImportError> {
        let names: Vec<String> = header
            .iter()
            .map(|raw| {
                String::from_utf8_lossy(raw)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_lowercase()
            })
            .collect();
        let position = |name: &str| names.iter().position(|n| n == name);

        Ok(Self {
            email: position("email").ok_or(ImportError::MissingEmailColumn)?,
            first_name: position("first_name"),
            last_name: position("last_name"),
        })
    }

    fn extract(&self, record: &ByteRecord, row: u64) -> Result<ParsedRow, RowError> {
        let used = [Some(self.email), self.first_name, self.last_name];
        if used
            .iter()
            .filter_map(|index| record.get((*index)?))
            .any(|raw| raw.contains(&0))
        {
            return Err(RowError::nul_byte(row));
        }

        let email = field(record, Some(self.email)).ok_or_else(|| RowError::missing_email(row))?;

        Ok(ParsedRow {
            email,
            first_name: field(record, self.first_name),
            last_name: field(record, self.last_name),
        })
    }
}

fn field(record: &ByteRecord, index: Option<usize>) -> Option<String> {
    let raw = record.get(index?)?;
    let value = String::from_utf8_lossy(raw).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn is_blank(record: &ByteRecord) -> bool {
    record.len() <= 1 && record.iter().all(|f| f.iter().all(u8::is_ascii_whitespace))
}

/// One data line, valid or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// 1-based data row number
    pub row: u64,
    /// Bytes consumed from the source after this line
    pub bytes_read: u64,
    pub outcome: Result<ParsedRow, RowError>,
}

/// Lazy, non-restartable sequence of data lines
pub struct ContactCsvReader<R: Read> {
    reader: csv::Reader<R>,
    columns: HeaderColumns,
    record: ByteRecord,
    rows_read: u64,
    done: bool,
}

impl<R: Read> ContactCsvReader<R> {
    /// Read and validate the header; fails if there is no `email` column.
    pub fn new(source: R) -> Result<Self, ImportError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(source);

        let mut record = ByteRecord::new();
        loop {
            if !reader.read_byte_record(&mut record)? {
                return Err(ImportError::EmptyFile);
            }
            if !is_blank(&record) {
                break;
            }
        }
        let columns = HeaderColumns::from_record(&record)?;

        Ok(Self {
            reader,
            columns,
            record,
            rows_read: 0,
            done: false,
        })
    }

    pub fn bytes_read(&self) -> u64 {
        self.reader.position().byte()
    }

    fn next_line(&mut self) -> Result<Option<ParsedLine>, ImportError> {
        loop {
            if !self.reader.read_byte_record(&mut self.record)? {
                return Ok(None);
            }
            if is_blank(&self.record) {
                continue;
            }
            self.rows_read += 1;
            return Ok(Some(ParsedLine {
                row: self.rows_read,
                bytes_read: self.bytes_read(),
                outcome: self.columns.extract(&self.record, self.rows_read),
            }));
        }
    }
}

impl<R: Read> Iterator for ContactCsvReader<R> {
    type Item = Result<ParsedLine, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse `path` on the blocking pool, streaming lines through a bounded channel.
///
/// A structural error is sent as the last item. The parser stops early if the
/// receiver is dropped.
pub fn spawn_file_parser(
    path: PathBuf,
    capacity: usize,
) -> (mpsc::Receiver<Result<ParsedLine, ImportError>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        let parser = match File::open(&path)
            .map_err(ImportError::from)
            .and_then(ContactCsvReader::new)
        {
            Ok(parser) => parser,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };

        for item in parser {
            if tx.blocking_send(item).is_err() {
                debug!("Import consumer went away, stopping parser for {}", path.display());
                return;
            }
        }
    });

    (rx, handle)
}
