//! Error types for the dedup engine

use thiserror::Error;

/// Dedup engine errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] bibdedup_formats::Error),

    #[error("Document already exists: {0}")]
    DuplicateId(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;
