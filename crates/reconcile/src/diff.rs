//! Change detection between desired jobs and the last-applied snapshot

use crate::types::{RenderedJob, SnapshotConfig, SnapshotEntry};
use jobsapi::JobId;
use std::collections::BTreeMap;

/// Whether `desired` matches what was last applied.
///
/// Only the rendered job is compared; the recorded identifier is ignored.
/// A workflow with no previous entry is always changed.
pub fn is_unchanged(desired: &RenderedJob, last: Option<&SnapshotEntry>) -> bool {
    last.is_some_and(|entry| entry.job == *desired)
}

/// Workflows queued for an update batch, in name order.
///
/// The three vectors are parallel: `ids[i]` is the identifier recorded for
/// `names[i]`, and `jobs[i]` its new payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateQueue {
    pub names: Vec<String>,
    pub ids: Vec<Option<JobId>>,
    pub jobs: Vec<RenderedJob>,
}

impl UpdateQueue {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn push(&mut self, name: &str, id: Option<JobId>, job: &RenderedJob) {
        self.names.push(name.to_string());
        self.ids.push(id);
        self.jobs.push(job.clone());
    }
}

/// Queue every desired workflow whose rendered job differs from its
/// last-applied entry, carrying the recorded identifier (if any).
pub fn classify_updates(
    desired: &BTreeMap<String, RenderedJob>,
    last: &SnapshotConfig,
) -> UpdateQueue {
    let mut queue = UpdateQueue::default();

    for (name, job) in desired {
        let previous = last.get(name);
        if is_unchanged(job, previous) {
            log::debug!("No update required for workflow '{name}' (unchanged)");
            continue;
        }

        let id = previous.and_then(|entry| entry.job_id);
        log::info!("Workflow '{name}' marked for update");
        queue.push(name, id, job);
    }

    queue
}

/// Workflow names recorded in `last` but absent from `desired`.
pub fn removed_names(desired: &BTreeMap<String, RenderedJob>, last: &SnapshotConfig) -> Vec<String> {
    last.keys()
        .filter(|name| !desired.contains_key(*name))
        .cloned()
        .collect()
}

/// Identifiers of the workflows recorded in `last` but absent from
/// `desired`, in name order. Entries without an identifier contribute `None`.
pub fn detect_removed(
    desired: &BTreeMap<String, RenderedJob>,
    last: &SnapshotConfig,
) -> Vec<Option<JobId>> {
    let mut removed = Vec::new();

    for (name, entry) in last {
        if desired.contains_key(name) {
            log::debug!("Workflow retained: {name}");
            continue;
        }
        match entry.job_id {
            Some(id) => log::info!("Workflow removed: {name} with job ID {id}"),
            None => log::warn!("Workflow removed: {name} has no recorded job ID"),
        }
        removed.push(entry.job_id);
    }

    removed
}
