//! Sample storage
//!
//! Loads the delimited source file and owns the shared read cursor.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use super::SourceError;

/// One row of the loaded source data, keyed by column name.
///
/// Immutable once loaded; every record in a store shares the same header set.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    columns: Arc<Vec<String>>,
    values: Vec<String>,
}

impl SampleRecord {
    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx).map(String::as_str)
    }

    /// Column names, in file order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw values, in column order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Values concatenated in column order with no delimiter.
    /// This is the payload written to the wire.
    pub fn concat_values(&self) -> String {
        self.values.concat()
    }
}

/// Ordered sample records plus the wrapping read cursor.
///
/// `next()` is shared between the command server's on-demand path and the
/// periodic sampler, so the cursor lives behind a mutex and read-then-advance
/// is a single critical section.
#[derive(Debug)]
pub struct SampleStore {
    records: Vec<SampleRecord>,
    cursor: Mutex<usize>,
}

impl SampleStore {
    /// Load a store from a comma-delimited file.
    ///
    /// The first row is the header; every following row becomes one
    /// [`SampleRecord`]. Fails if there is no header, no data rows, or a row
    /// whose column count does not match the header.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a store from any buffered reader of delimited text
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SourceError> {
        let mut lines = reader.lines();

        let header = loop {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Err(SourceError::MissingHeader),
            }
        };
        let columns: Arc<Vec<String>> =
            Arc::new(header.split(',').map(|c| c.trim().to_string()).collect());

        let mut records = Vec::new();
        for (idx, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let values: Vec<String> = line.split(',').map(|v| v.trim().to_string()).collect();
            if values.len() != columns.len() {
                return Err(SourceError::ColumnMismatch {
                    // 1-based, counting the header as line 1
                    line: idx + 2,
                    expected: columns.len(),
                    actual: values.len(),
                });
            }
            records.push(SampleRecord {
                columns: Arc::clone(&columns),
                values,
            });
        }

        if records.is_empty() {
            return Err(SourceError::EmptySource);
        }

        Ok(Self {
            records,
            cursor: Mutex::new(0),
        })
    }

    /// Number of records in the store
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false: construction fails on an empty source
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column names shared by every record
    pub fn columns(&self) -> &[String] {
        self.records[0].columns()
    }

    /// Return the record at the cursor, then advance the cursor by one with
    /// wraparound. Concurrent callers observe distinct, sequential records;
    /// no record is skipped or duplicated short of natural wraparound.
    pub fn next(&self) -> SampleRecord {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let record = self.records[*cursor].clone();
        *cursor = (*cursor + 1) % self.records.len();
        record
    }
}
