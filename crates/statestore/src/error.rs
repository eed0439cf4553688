//! Error types for the statestore crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during blob store operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a blob
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a blob
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Blob content is not valid JSON
    #[error("invalid JSON in {bucket}/{key}: {source}")]
    Json {
        bucket: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Empty or otherwise unusable bucket, key or prefix
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Result type for blob store operations
pub type Result<T> = std::result::Result<T, Error>;
