//! # Statestore
//!
//! Bucket/key blob storage for JSON state documents.
//!
//! This crate provides:
//! - The [`BlobStore`] trait: get/put/list over `bucket` + `key` addresses
//! - [`FsStore`]: a durable backend laying buckets out as directories
//! - [`MemoryStore`]: an in-process backend for tests, with failure injection
//!
//! Keys may contain `/` separators. Listing returns bare file names (the last
//! key segment), mirroring how object stores are usually browsed by prefix.
//!
//! ## Example
//!
//! ```no_run
//! use statestore::{BlobStore, FsStore};
//! use std::path::Path;
//!
//! let store = FsStore::new(Path::new("/var/lib/jobsync"));
//! store.put("workflows", "current_state.json", &serde_json::json!({"config": {}}))?;
//!
//! let doc = store.get("workflows", "current_state.json")?;
//! assert!(doc.is_some());
//! # Ok::<(), statestore::Error>(())
//! ```

mod error;
mod fs;
mod memory;

pub use error::{Error, Result};
pub use fs::FsStore;
pub use memory::MemoryStore;

use serde_json::Value;

/// A durable key-value store for JSON documents
pub trait BlobStore: Send + Sync {
    /// Read the document at `bucket/key`
    ///
    /// Returns `Ok(None)` when nothing is stored there. Failures to reach or
    /// decode the blob are errors, never `None`.
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>>;

    /// Write (or overwrite) the document at `bucket/key`
    fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()>;

    /// List the file names stored under `prefix` in `bucket`
    ///
    /// The prefix is treated as a directory: a trailing `/` is implied.
    /// Names are returned without the prefix, sorted.
    fn list_names(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

impl<S: BlobStore + ?Sized> BlobStore for Box<S> {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>> {
        (**self).get(bucket, key)
    }

    fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        (**self).put(bucket, key, value)
    }

    fn list_names(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        (**self).list_names(bucket, prefix)
    }
}

/// Reject empty buckets and keys, and keys that escape their bucket
pub(crate) fn validate_address(bucket: &str, key: &str) -> Result<()> {
    if bucket.trim().is_empty() {
        return Err(Error::InvalidKey("bucket name must not be empty".to_string()));
    }
    if key.trim().is_empty() {
        return Err(Error::InvalidKey("key must not be empty".to_string()));
    }
    if bucket.contains('/') || bucket == "." || bucket == ".." {
        return Err(Error::InvalidKey(format!("invalid bucket name: {bucket}")));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(Error::InvalidKey(format!("key escapes its bucket: {key}")));
    }
    Ok(())
}

/// Normalize a listing prefix so it always ends in `/`
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}
