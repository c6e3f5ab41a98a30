//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line of a batch file is not a valid batch.
    #[error("invalid batch on line {line}: {source}")]
    InvalidBatch {
        /// One-based line number.
        line: usize,
        /// Decoding error.
        source: serde_json::Error,
    },
}
