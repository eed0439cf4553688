//! Error types for reconciliation
//!
//! Per-item remote failures never appear here; they are absorbed into batch
//! results. These errors end the run.

use crate::version::VersionError;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stored version label could not be parsed
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The state store rejected a read or write
    #[error("state store error: {0}")]
    Store(#[from] statestore::Error),

    /// The current snapshot exists but cannot be read
    #[error("state at {bucket}/{key} is unavailable: {reason}")]
    Unavailable {
        bucket: String,
        key: String,
        reason: String,
    },

    /// A stored snapshot is missing its version label
    #[error("snapshot at {bucket}/{key} has no metadata.version")]
    MissingVersion { bucket: String, key: String },

    /// A snapshot document could not be encoded or decoded
    #[error("invalid snapshot document: {0}")]
    Json(#[from] serde_json::Error),
}
