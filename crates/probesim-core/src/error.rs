//! Emulator errors

use thiserror::Error;

/// Errors that can occur while loading the sample source file
#[derive(Error, Debug)]
pub enum SourceError {
    /// Reading the file itself failed
    #[error("I/O error reading source file: {0}")]
    Io(#[from] std::io::Error),

    /// The file ended before a header row
    #[error("source file has no header row")]
    MissingHeader,

    /// A header but zero data rows: the store would be unusable
    #[error("source file has no data rows")]
    EmptySource,

    /// A data row whose column count does not match the header
    #[error("row {line}: expected {expected} columns, got {actual}")]
    ColumnMismatch {
        line: usize,
        expected: usize,
        actual: usize,
    },
}

/// Errors that can occur on the serial transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port could not be opened at startup (busy, missing, permissions).
    /// Kept distinct from runtime I/O so a connection failure never reads
    /// like a parse failure.
    #[error("failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Read/write failure after a successful open; fatal to the session
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
