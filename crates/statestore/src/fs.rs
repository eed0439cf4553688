//! Filesystem-backed blob store

use crate::error::{Error, Result};
use crate::{BlobStore, normalize_prefix, validate_address};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Blob store laying out `root/<bucket>/<key>` on disk
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// reader never observes a half-written document.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// The root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.root.join(bucket);
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

impl BlobStore for FsStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>> {
        validate_address(bucket, key)?;
        let path = self.blob_path(bucket, key);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No blob at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(Error::ReadFailed { path, source }),
        };

        let value = serde_json::from_str(&content).map_err(|source| Error::Json {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        })?;

        log::debug!("Read blob {}", path.display());
        Ok(Some(value))
    }

    fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        validate_address(bucket, key)?;
        let path = self.blob_path(bucket, key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        })?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content).map_err(|source| Error::WriteFailed {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| Error::WriteFailed {
            path: path.clone(),
            source,
        })?;

        log::debug!("Wrote blob {}", path.display());
        Ok(())
    }

    fn list_names(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        validate_address(bucket, prefix)?;
        let prefix = normalize_prefix(prefix);
        let dir = self.blob_path(bucket, &prefix);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Error::ReadFailed { path: dir, source }),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            // Skip in-flight writes
            if name.ends_with(".tmp") {
                continue;
            }
            names.push(name);
        }
        names.sort();

        Ok(names)
    }
}
