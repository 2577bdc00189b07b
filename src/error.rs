//! Failure taxonomy shared by the record sources and the snapshot reader.
//!
//! End-of-stream is never an error: exhausted sources and readers report it
//! as `Ok(None)`. Everything in [`ReadError`] is terminal for the traversal
//! that produced it; resuming is only defined via an explicit restart.

use thiserror::Error;

/// Errors produced while decoding a depth dump.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The field delimiter could not be detected from the sample window.
    /// Fatal at construction; the source handle is closed before returning.
    #[error("could not detect field delimiter: {reason}")]
    Dialect { reason: String },

    /// A row's shape disagrees with the header, or a value that must be
    /// numeric (the `level` column) is not.
    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    /// A column required to build a level entry is absent from the record.
    #[error("record at line {line} ({identity}) is missing required column '{field}'")]
    MissingField {
        line: u64,
        field: &'static str,
        identity: String,
    },

    /// A source variant does not implement an operation the caller relied
    /// on (e.g. rewinding a non-seekable stream). An integration bug, not
    /// a data error.
    #[error("record source does not support {0}")]
    Unsupported(&'static str),

    /// I/O failure from the underlying byte source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
