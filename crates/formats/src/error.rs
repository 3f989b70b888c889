//! Error types for record formats and metadata views

use thiserror::Error;

/// Record format errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Unsupported metadata format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid metadata payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid file: {0}")]
    InvalidFile(String),
}

/// Result type alias for format operations
pub type Result<T> = std::result::Result<T, Error>;
