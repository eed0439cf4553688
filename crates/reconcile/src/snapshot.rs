//! Versioned snapshot persistence
//!
//! Two copies are kept in the state store: one "current" document that every
//! commit overwrites, and an append-only trail of historic documents named
//! `state_file_<version>.json` under a prefix.

use crate::error::{Error, Result};
use crate::types::{Metadata, SnapshotConfig, StateSnapshot};
use crate::version::{Version, VersionError};
use statestore::BlobStore;

/// Historic snapshot file names are `state_file_<version>.json`
const HISTORIC_FILE_PREFIX: &str = "state_file_";
const HISTORIC_FILE_SUFFIX: &str = ".json";

/// Commit timestamp format (local time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where snapshots live in the state store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLocation {
    pub bucket: String,
    pub current_key: String,
    pub historic_prefix: String,
}

impl Default for SnapshotLocation {
    fn default() -> Self {
        Self {
            bucket: "databricks-workflow".to_string(),
            current_key: "current_state.json".to_string(),
            historic_prefix: "historic_state".to_string(),
        }
    }
}

impl SnapshotLocation {
    /// Key of the historic snapshot for `version`
    pub fn historic_key(&self, version: &Version) -> String {
        format!(
            "{}/{HISTORIC_FILE_PREFIX}{version}{HISTORIC_FILE_SUFFIX}",
            self.historic_prefix.trim_end_matches('/')
        )
    }
}

/// Outcome of reading the current snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotRead {
    /// Nothing has been committed yet (first run)
    Absent,
    Found(StateSnapshot),
}

impl SnapshotRead {
    pub fn snapshot(&self) -> Option<&StateSnapshot> {
        match self {
            Self::Absent => None,
            Self::Found(snapshot) => Some(snapshot),
        }
    }

    /// The recorded workflows, empty on a first run
    pub fn into_config(self) -> SnapshotConfig {
        match self {
            Self::Absent => SnapshotConfig::new(),
            Self::Found(snapshot) => snapshot.config,
        }
    }
}

/// Reads and commits snapshots through a [`BlobStore`]
pub struct SnapshotStore {
    store: Box<dyn BlobStore>,
    location: SnapshotLocation,
}

impl SnapshotStore {
    pub fn new(store: Box<dyn BlobStore>, location: SnapshotLocation) -> Self {
        Self { store, location }
    }

    pub fn location(&self) -> &SnapshotLocation {
        &self.location
    }

    /// Read the current snapshot.
    ///
    /// A store failure or an undecodable document is [`Error::Unavailable`],
    /// never [`SnapshotRead::Absent`].
    pub fn load_current(&self) -> Result<SnapshotRead> {
        let bucket = &self.location.bucket;
        let key = &self.location.current_key;
        let unavailable = |reason: String| Error::Unavailable {
            bucket: bucket.clone(),
            key: key.clone(),
            reason,
        };

        let value = match self.store.get(bucket, key) {
            Ok(Some(value)) => value,
            Ok(None) => {
                log::info!("No current state at {bucket}/{key}; treating as first run");
                return Ok(SnapshotRead::Absent);
            }
            Err(e) => return Err(unavailable(e.to_string())),
        };

        let snapshot: StateSnapshot =
            serde_json::from_value(value).map_err(|e| unavailable(e.to_string()))?;
        log::debug!(
            "Read current state version {} ({} workflows)",
            snapshot.metadata.version,
            snapshot.config.len()
        );
        Ok(SnapshotRead::Found(snapshot))
    }

    /// Version label of the current snapshot, read afresh from the store.
    pub fn current_version(&self) -> Result<Option<Version>> {
        let bucket = &self.location.bucket;
        let key = &self.location.current_key;

        let Some(value) = self.store.get(bucket, key)? else {
            return Ok(None);
        };

        let label = value
            .get("metadata")
            .and_then(|m| m.get("version"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::MissingVersion {
                bucket: bucket.clone(),
                key: key.clone(),
            })?;

        if label.is_empty() {
            return Ok(None);
        }
        Ok(Some(label.parse::<Version>()?))
    }

    /// Persist `config` as the next version.
    ///
    /// The historic document is written first, then the current document is
    /// overwritten. Returns the snapshot as written.
    pub fn commit(&self, config: SnapshotConfig) -> Result<StateSnapshot> {
        let current = self.current_version()?;
        let version = Version::next(current.as_ref())?;
        log::debug!(
            "Current version: {}; next: {version}",
            current.map_or_else(|| "none".to_string(), |v| v.to_string())
        );

        let snapshot = StateSnapshot {
            metadata: Metadata {
                version: version.to_string(),
                timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            },
            config,
        };
        let document = serde_json::to_value(&snapshot)?;

        let bucket = &self.location.bucket;
        let historic_key = self.location.historic_key(&version);
        self.store.put(bucket, &historic_key, &document)?;
        log::info!("Written state version {version} to {bucket}/{historic_key}");

        self.store.put(bucket, &self.location.current_key, &document)?;
        log::info!(
            "Updated current state at {bucket}/{}",
            self.location.current_key
        );

        Ok(snapshot)
    }

    /// Versions in the historic trail, ascending.
    ///
    /// File names that do not follow `state_file_<version>.json` are ignored.
    pub fn historic_versions(&self) -> Result<Vec<Version>> {
        let names = self
            .store
            .list_names(&self.location.bucket, &self.location.historic_prefix)?;

        let mut versions: Vec<Version> = names
            .iter()
            .filter_map(|name| match parse_historic_name(name) {
                Some(Ok(version)) => Some(version),
                Some(Err(e)) => {
                    log::debug!("Ignoring historic file {name}: {e}");
                    None
                }
                None => None,
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Second-highest historic version, if at least two exist.
    pub fn previous_version(&self) -> Result<Option<Version>> {
        let versions = self.historic_versions()?;
        Ok(versions.len().checked_sub(2).map(|i| versions[i]))
    }

    /// Read the historic snapshot for `version`.
    pub fn load_historic(&self, version: &Version) -> Result<Option<StateSnapshot>> {
        let key = self.location.historic_key(version);
        match self.store.get(&self.location.bucket, &key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

/// `Some(..)` when `name` looks like a historic file, parsed or not
fn parse_historic_name(name: &str) -> Option<std::result::Result<Version, VersionError>> {
    let label = name
        .strip_prefix(HISTORIC_FILE_PREFIX)?
        .strip_suffix(HISTORIC_FILE_SUFFIX)?;
    Some(label.parse())
}
