//! The reconciliation engine
//!
//! A run compares three inputs: the desired jobs, the last-applied
//! snapshot, and the live inventory of remote job names. It then executes
//! three phases in a fixed order (update, delete, create). Each phase
//! commits a new snapshot only after its remote mutation succeeded.

use crate::attach::{FreshIds, attach_ids};
use crate::diff::{classify_updates, detect_removed, removed_names};
use crate::error::Result;
use crate::snapshot::SnapshotStore;
use crate::types::{RenderedJob, SnapshotConfig};
use jobsapi::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The set of job names that exist remotely, if it could be retrieved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveInventory {
    names: Option<BTreeSet<String>>,
}

impl LiveInventory {
    pub fn available(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: Some(names.into_iter().collect()),
        }
    }

    pub fn unavailable() -> Self {
        Self { names: None }
    }

    /// Retrieve the inventory through `client`
    pub fn fetch(client: &Client) -> Self {
        match client.list_job_names() {
            Some(names) => {
                log::info!("Retrieved {} existing remote jobs", names.len());
                Self::available(names)
            }
            None => {
                log::warn!("Remote job inventory unavailable; job creation will be skipped");
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.names.is_some()
    }

    pub fn names(&self) -> Option<&BTreeSet<String>> {
        self.names.as_ref()
    }

    pub fn contains(&self, job_name: &str) -> bool {
        self.names.as_ref().is_some_and(|n| n.contains(job_name))
    }

    /// Names to treat as live when reattaching identifiers.
    ///
    /// Without an inventory, the job names recorded in `last` stand in, so
    /// known identifiers carry forward.
    pub fn names_or_recorded(&self, last: &SnapshotConfig) -> BTreeSet<String> {
        match &self.names {
            Some(names) => names.clone(),
            None => last.values().map(|entry| entry.job.name.clone()).collect(),
        }
    }
}

/// What one phase of a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// The phase could not run
    Skipped { reason: String },
    /// Nothing to do
    NoChanges,
    /// Every item succeeded and the snapshot was committed
    Applied { count: usize, version: String },
    /// Some items succeeded and were committed, others failed
    Partial {
        applied: usize,
        failed: usize,
        version: String,
    },
    /// The remote mutation failed; nothing was committed
    Failed { count: usize },
}

impl PhaseOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Skipped { .. } | Self::Partial { .. } | Self::Failed { .. }
        )
    }

    /// Version committed by this phase, if any
    pub fn committed_version(&self) -> Option<&str> {
        match self {
            Self::Applied { version, .. } | Self::Partial { version, .. } => Some(version),
            _ => None,
        }
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::NoChanges => write!(f, "no changes"),
            Self::Applied { count, version } => write!(f, "{count} applied, state {version}"),
            Self::Partial {
                applied,
                failed,
                version,
            } => write!(f, "{applied} applied, {failed} failed, state {version}"),
            Self::Failed { count } => write!(f, "failed ({count} queued, state not saved)"),
        }
    }
}

/// Outcome of every phase of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub update: PhaseOutcome,
    pub delete: PhaseOutcome,
    pub create: PhaseOutcome,
}

impl ReconcileReport {
    pub fn phases(&self) -> [(&'static str, &PhaseOutcome); 3] {
        [
            ("update", &self.update),
            ("delete", &self.delete),
            ("create", &self.create),
        ]
    }

    pub fn is_success(&self) -> bool {
        self.phases().iter().all(|(_, outcome)| !outcome.is_failure())
    }

    /// Latest version committed during the run
    pub fn final_version(&self) -> Option<&str> {
        self.phases()
            .iter()
            .rev()
            .find_map(|(_, outcome)| outcome.committed_version())
    }
}

/// Snapshot content accumulated across the phases of one run
struct RunState {
    /// Desired jobs, with failed updates of known jobs reverted to their
    /// last-applied job
    baseline: BTreeMap<String, RenderedJob>,
    /// Removed workflows whose deletion has not succeeded yet
    retained: SnapshotConfig,
    /// Job names known to exist remotely
    live: BTreeSet<String>,
}

impl RunState {
    fn new(
        desired: &BTreeMap<String, RenderedJob>,
        last: &SnapshotConfig,
        live: &LiveInventory,
    ) -> Self {
        let retained = last
            .iter()
            .filter(|(name, _)| !desired.contains_key(*name))
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        Self {
            baseline: desired.clone(),
            retained,
            live: live.names_or_recorded(last),
        }
    }

    /// Keep the last-applied job for workflows whose update did not land
    fn revert(&mut self, names: &[String], last: &SnapshotConfig) {
        for name in names {
            if let Some(entry) = last.get(name) {
                self.baseline.insert(name.clone(), entry.job.clone());
            }
        }
    }

    fn config(&self, last: &SnapshotConfig, fresh: Option<&mut FreshIds>) -> SnapshotConfig {
        let mut config = attach_ids(&self.baseline, last, &self.live, fresh);
        for (name, entry) in &self.retained {
            config.insert(name.clone(), entry.clone());
        }
        config
    }
}

/// Drives one reconciliation run against a job client and a snapshot store
pub struct Reconciler<'a> {
    client: &'a Client,
    snapshots: &'a SnapshotStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a Client, snapshots: &'a SnapshotStore) -> Self {
        Self { client, snapshots }
    }

    /// Run the update, delete and create phases in that order.
    ///
    /// Remote failures are reported per phase. Errors are returned only for
    /// state-store and version problems, which end the run.
    pub fn reconcile(
        &self,
        desired: &BTreeMap<String, RenderedJob>,
        last: &SnapshotConfig,
        live: &LiveInventory,
    ) -> Result<ReconcileReport> {
        let mut run = RunState::new(desired, last, live);

        let update = self.update_phase(desired, last, &mut run)?;
        log::info!("Update phase: {update}");
        let delete = self.delete_phase(desired, last, &mut run)?;
        log::info!("Delete phase: {delete}");
        let create = self.create_phase(last, live, &mut run)?;
        log::info!("Create phase: {create}");

        Ok(ReconcileReport {
            update,
            delete,
            create,
        })
    }

    fn update_phase(
        &self,
        desired: &BTreeMap<String, RenderedJob>,
        last: &SnapshotConfig,
        run: &mut RunState,
    ) -> Result<PhaseOutcome> {
        let queue = classify_updates(desired, last);
        if queue.is_empty() {
            log::info!("No workflows require an update");
            return Ok(PhaseOutcome::NoChanges);
        }

        log::info!("Updating {} workflows", queue.len());
        let results = self.client.update_batch(&queue.ids, &queue.jobs);

        // renamed jobs now exist under their new name, even in a failed batch
        let mut reverted = Vec::new();
        for (i, (name, job)) in queue.names.iter().zip(&queue.jobs).enumerate() {
            if results.is_applied(i) {
                run.live.insert(job.name.clone());
            } else if queue.ids.get(i).copied().flatten().is_some() {
                reverted.push(name.clone());
            }
        }

        if !results.all_succeeded() {
            log::error!("Update batch did not fully succeed; state not saved");
            run.revert(&reverted, last);
            return Ok(PhaseOutcome::Failed { count: queue.len() });
        }

        let snapshot = self.snapshots.commit(run.config(last, None))?;
        Ok(PhaseOutcome::Applied {
            count: queue.len(),
            version: snapshot.metadata.version,
        })
    }

    fn delete_phase(
        &self,
        desired: &BTreeMap<String, RenderedJob>,
        last: &SnapshotConfig,
        run: &mut RunState,
    ) -> Result<PhaseOutcome> {
        let ids = detect_removed(desired, last);
        if ids.is_empty() {
            log::info!("No workflows removed");
            return Ok(PhaseOutcome::NoChanges);
        }

        log::info!(
            "Deleting {} removed workflows: {}",
            ids.len(),
            removed_names(desired, last).join(", ")
        );
        if !self.client.delete_batch(&ids) {
            log::error!("Delete batch did not fully succeed; state not saved");
            return Ok(PhaseOutcome::Failed { count: ids.len() });
        }

        run.retained.clear();
        let snapshot = self.snapshots.commit(run.config(last, None))?;
        Ok(PhaseOutcome::Applied {
            count: ids.len(),
            version: snapshot.metadata.version,
        })
    }

    fn create_phase(
        &self,
        last: &SnapshotConfig,
        live: &LiveInventory,
        run: &mut RunState,
    ) -> Result<PhaseOutcome> {
        if !live.is_available() {
            log::warn!("Skipping job creation: remote job inventory unavailable");
            return Ok(PhaseOutcome::Skipped {
                reason: "remote job inventory unavailable".to_string(),
            });
        }

        let jobs: Vec<RenderedJob> = run.baseline.values().cloned().collect();
        let attempted = jobs.iter().filter(|j| !run.live.contains(&j.name)).count();

        let created = self.client.create_batch(&run.live, &jobs);
        if created.is_empty() {
            if attempted == 0 {
                log::info!("All desired jobs already exist");
                return Ok(PhaseOutcome::NoChanges);
            }
            log::error!("No jobs were created; state not saved");
            return Ok(PhaseOutcome::Failed { count: attempted });
        }

        log::info!("Created {} of {attempted} new jobs", created.len());
        let mut fresh = FreshIds::new(&created);
        let snapshot = self.snapshots.commit(run.config(last, Some(&mut fresh)))?;
        if !fresh.is_empty() {
            log::warn!(
                "{} created job IDs matched no desired workflow",
                fresh.remaining()
            );
        }

        let applied = created.len();
        let version = snapshot.metadata.version;
        Ok(if applied < attempted {
            PhaseOutcome::Partial {
                applied,
                failed: attempted - applied,
                version,
            }
        } else {
            PhaseOutcome::Applied {
                count: applied,
                version,
            }
        })
    }
}
