//! Job-identifier reattachment
//!
//! Rendered jobs carry no identifier; before a snapshot is written each
//! workflow gets the identifier of the remote job it maps to.

use crate::types::{RenderedJob, SnapshotConfig, SnapshotEntry};
use jobsapi::{CreatedJob, JobId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Identifiers handed out by a create batch, keyed by the job name they
/// were created under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreshIds {
    by_name: BTreeMap<String, VecDeque<JobId>>,
}

impl FreshIds {
    pub fn new(created: &[CreatedJob]) -> Self {
        let mut by_name: BTreeMap<String, VecDeque<JobId>> = BTreeMap::new();
        for job in created {
            by_name
                .entry(job.name.clone())
                .or_default()
                .push_back(job.job_id);
        }
        Self { by_name }
    }

    /// Take the oldest unclaimed identifier created for `job_name`.
    pub fn take(&mut self, job_name: &str) -> Option<JobId> {
        self.by_name.get_mut(job_name)?.pop_front()
    }

    /// Number of identifiers not yet claimed.
    pub fn remaining(&self) -> usize {
        self.by_name.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Pair every desired workflow with a job identifier.
///
/// A workflow whose job name is live keeps the identifier recorded for its
/// workflow name in `last`. Otherwise it claims a fresh identifier created
/// under its job name, when `fresh` is given. Anything else stays
/// unassigned. Returns a new map; inputs are not modified.
pub fn attach_ids(
    desired: &BTreeMap<String, RenderedJob>,
    last: &SnapshotConfig,
    live_names: &BTreeSet<String>,
    mut fresh: Option<&mut FreshIds>,
) -> SnapshotConfig {
    let mut attached = SnapshotConfig::new();

    for (name, job) in desired {
        let job_id = if live_names.contains(&job.name) {
            let recorded = last.get(name).and_then(|entry| entry.job_id);
            if recorded.is_none() {
                log::warn!(
                    "Job '{}' exists remotely but workflow '{name}' has no recorded job ID",
                    job.name
                );
            }
            recorded
        } else if let Some(id) = fresh.as_deref_mut().and_then(|f| f.take(&job.name)) {
            log::debug!("Workflow '{name}' attached to new job ID {id}");
            Some(id)
        } else {
            log::warn!("No job ID available for workflow '{name}' (job '{}')", job.name);
            None
        };

        attached.insert(name.clone(), SnapshotEntry::new(job.clone(), job_id));
    }

    attached
}
