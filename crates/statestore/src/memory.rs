//! In-memory blob store for tests

use crate::error::{Error, Result};
use crate::{BlobStore, normalize_prefix, validate_address};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type Blobs = BTreeMap<(String, String), Value>;

/// Blob store holding documents in memory
///
/// Clones share the same underlying storage, so a test can keep a handle
/// while handing another to the code under test. Reads and writes can be
/// made to fail to simulate a degraded store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<Blobs>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get`/`list_names` fail (or succeed again)
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `put` fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `put` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// All keys stored in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Blobs> {
        match self.blobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn unavailable(op: &str) -> Error {
        Error::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("simulated {op} failure"),
        ))
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>> {
        validate_address(bucket, key)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("read"));
        }
        Ok(self
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&self, bucket: &str, key: &str, value: &Value) -> Result<()> {
        validate_address(bucket, key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("write"));
        }
        self.lock()
            .insert((bucket.to_string(), key.to_string()), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_names(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        validate_address(bucket, prefix)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("list"));
        }
        let prefix = normalize_prefix(prefix);

        // BTreeMap keys are already sorted
        Ok(self
            .lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .filter_map(|(_, key)| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let store = MemoryStore::new();
        let doc = json!({"metadata": {"version": "1.0"}});

        assert_eq!(store.get("bucket", "current_state.json").unwrap(), None);
        store.put("bucket", "current_state.json", &doc).unwrap();
        assert_eq!(store.get("bucket", "current_state.json").unwrap(), Some(doc));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store.put("bucket", "k.json", &json!(1)).unwrap();
        assert_eq!(handle.get("bucket", "k.json").unwrap(), Some(json!(1)));
        assert_eq!(handle.write_count(), 1);
    }

    #[test]
    fn test_list_names_only_direct_children() {
        let store = MemoryStore::new();
        store.put("bucket", "historic/state_file_1.0.json", &json!({})).unwrap();
        store.put("bucket", "historic/nested/x.json", &json!({})).unwrap();
        store.put("bucket", "historical.json", &json!({})).unwrap();
        store.put("other", "historic/state_file_9.9.json", &json!({})).unwrap();

        assert_eq!(
            store.list_names("bucket", "historic").unwrap(),
            vec!["state_file_1.0.json"]
        );
    }

    #[test]
    fn test_failure_injection() {
        let store = MemoryStore::new();
        store.put("bucket", "k.json", &json!(1)).unwrap();

        store.fail_reads(true);
        assert!(store.get("bucket", "k.json").is_err());
        assert!(store.list_names("bucket", "historic").is_err());

        store.fail_writes(true);
        assert!(store.put("bucket", "k.json", &json!(2)).is_err());
        assert_eq!(store.write_count(), 1);

        store.fail_reads(false);
        assert_eq!(store.get("bucket", "k.json").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_keys() {
        let store = MemoryStore::new();
        store.put("bucket", "b.json", &json!(1)).unwrap();
        store.put("bucket", "a.json", &json!(1)).unwrap();
        assert_eq!(store.keys("bucket"), vec!["a.json", "b.json"]);
        assert!(store.keys("missing").is_empty());
    }
}
