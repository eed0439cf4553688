//! # Reconcile
//!
//! Converge a remote job API onto a declarative set of jobs, keeping a
//! versioned record of what was last applied.
//!
//! ## Core Concepts
//!
//! - **RenderedJob**: the full wire payload for one workflow, compared by
//!   deep equality for change detection
//! - **StateSnapshot**: the last-applied jobs and their remote identifiers,
//!   stored as a "current" document plus an append-only historic trail
//! - **LiveInventory**: job names that exist remotely, when retrievable
//! - **Reconciler**: runs the update, delete and create phases, committing a
//!   new snapshot after each successful remote mutation
//!
//! ## Example
//!
//! ```no_run
//! use jobsapi::{ApiConfig, Client};
//! use reconcile::{LiveInventory, Reconciler, SnapshotLocation, SnapshotStore};
//! use statestore::FsStore;
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! let client = Client::new(&ApiConfig::new("https://api.example.com", "token"));
//! let snapshots = SnapshotStore::new(
//!     Box::new(FsStore::new(Path::new("/var/lib/jobsync"))),
//!     SnapshotLocation::default(),
//! );
//!
//! let desired = BTreeMap::new();
//! let last = snapshots.load_current()?.into_config();
//! let live = LiveInventory::fetch(&client);
//!
//! let report = Reconciler::new(&client, &snapshots).reconcile(&desired, &last, &live)?;
//! println!("success: {}", report.is_success());
//! # Ok::<(), reconcile::Error>(())
//! ```
//!
//! ## Failure model
//!
//! Per-item remote failures downgrade a phase to failed and block its
//! commit; they never abort the run. State-store and version errors do.

pub mod attach;
pub mod diff;
pub mod engine;
mod error;
pub mod planner;
pub mod snapshot;
pub mod types;
pub mod version;

pub use attach::{FreshIds, attach_ids};
pub use diff::{UpdateQueue, classify_updates, detect_removed, is_unchanged};
pub use engine::{LiveInventory, PhaseOutcome, ReconcileReport, Reconciler};
pub use error::{Error, Result};
pub use planner::{PlannedRemoval, PlannedUpdate, ReconcilePlan, plan};
pub use snapshot::{SnapshotLocation, SnapshotRead, SnapshotStore};
pub use types::{
    AccessControl, EmailNotifications, Metadata, RenderedJob, Schedule, SnapshotConfig,
    SnapshotEntry, StateSnapshot,
};
pub use version::{Version, VersionError, next_label};
