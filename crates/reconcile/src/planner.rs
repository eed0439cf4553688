//! Side-effect-free preview of a reconciliation run

use crate::diff::is_unchanged;
use crate::engine::LiveInventory;
use crate::types::{RenderedJob, SnapshotConfig, SnapshotEntry};
use jobsapi::JobId;
use std::collections::BTreeMap;

/// A workflow whose rendered job differs from what was last applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub workflow: String,
    pub job_id: Option<JobId>,
    /// No entry was recorded for this workflow before
    pub is_new: bool,
}

/// A recorded workflow that is no longer desired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRemoval {
    pub workflow: String,
    pub job_name: String,
    pub job_id: Option<JobId>,
}

/// What a run would do with the same inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub unchanged: Vec<String>,
    pub updates: Vec<PlannedUpdate>,
    pub removals: Vec<PlannedRemoval>,
    /// Workflows whose job name does not exist remotely
    pub creates: Vec<String>,
    pub inventory_available: bool,
}

impl ReconcilePlan {
    pub fn has_changes(&self) -> bool {
        !self.updates.is_empty() || !self.removals.is_empty() || !self.creates.is_empty()
    }

    /// Updates of workflows that were applied before
    pub fn changed(&self) -> impl Iterator<Item = &PlannedUpdate> {
        self.updates.iter().filter(|u| !u.is_new)
    }

    pub fn change_count(&self) -> usize {
        self.changed().count() + self.removals.len() + self.creates.len()
    }

    /// Nothing is desired but recorded workflows exist, so every one of
    /// them would be deleted
    pub fn removes_everything(&self) -> bool {
        self.unchanged.is_empty() && self.updates.is_empty() && !self.removals.is_empty()
    }
}

/// Compute the plan for `desired` against `last` and `live`
pub fn plan(
    desired: &BTreeMap<String, RenderedJob>,
    last: &SnapshotConfig,
    live: &LiveInventory,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan {
        inventory_available: live.is_available(),
        ..ReconcilePlan::default()
    };

    for (name, job) in desired {
        let previous = last.get(name);
        if is_unchanged(job, previous) {
            plan.unchanged.push(name.clone());
        } else {
            plan.updates.push(PlannedUpdate {
                workflow: name.clone(),
                job_id: previous.and_then(|entry| entry.job_id),
                is_new: previous.is_none(),
            });
        }

        let exists = live.contains(&job.name) || renames_live_job(job, previous, live);
        if live.is_available() && !exists {
            plan.creates.push(name.clone());
        }
    }

    for (name, entry) in last {
        if !desired.contains_key(name) {
            plan.removals.push(PlannedRemoval {
                workflow: name.clone(),
                job_name: entry.job.name.clone(),
                job_id: entry.job_id,
            });
        }
    }

    plan
}

/// An update of a live job to a new name does not create a job
fn renames_live_job(job: &RenderedJob, previous: Option<&SnapshotEntry>, live: &LiveInventory) -> bool {
    previous.is_some_and(|entry| {
        entry.job_id.is_some() && entry.job.name != job.name && live.contains(&entry.job.name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{entry, job};

    fn desired(pairs: &[(&str, &str)]) -> BTreeMap<String, RenderedJob> {
        pairs
            .iter()
            .map(|(workflow, name)| ((*workflow).to_string(), job(name)))
            .collect()
    }

    fn live(names: &[&str]) -> LiveInventory {
        LiveInventory::available(names.iter().map(|n| (*n).to_string()))
    }

    #[test]
    fn test_plan_no_changes() {
        let last: SnapshotConfig = [("w1".to_string(), entry("alpha", 1))].into();
        let plan = plan(&desired(&[("w1", "alpha")]), &last, &live(&["alpha"]));

        assert!(!plan.has_changes());
        assert_eq!(plan.unchanged, vec!["w1"]);
        assert_eq!(plan.change_count(), 0);
    }

    #[test]
    fn test_plan_classifies_everything() {
        let last: SnapshotConfig = [
            ("keep".to_string(), entry("keep", 1)),
            ("edit".to_string(), entry("edit", 2)),
            ("drop".to_string(), entry("drop", 3)),
        ]
        .into();
        let mut wanted = desired(&[("keep", "keep"), ("edit", "edit"), ("add", "add")]);
        wanted.get_mut("edit").unwrap().max_concurrent_runs = 4;

        let plan = plan(&wanted, &last, &live(&["keep", "edit", "drop"]));

        assert_eq!(plan.unchanged, vec!["keep"]);
        assert_eq!(
            plan.updates,
            vec![
                PlannedUpdate {
                    workflow: "add".to_string(),
                    job_id: None,
                    is_new: true
                },
                PlannedUpdate {
                    workflow: "edit".to_string(),
                    job_id: Some(JobId(2)),
                    is_new: false
                },
            ]
        );
        assert_eq!(
            plan.removals,
            vec![PlannedRemoval {
                workflow: "drop".to_string(),
                job_name: "drop".to_string(),
                job_id: Some(JobId(3))
            }]
        );
        assert_eq!(plan.creates, vec!["add"]);
        assert_eq!(plan.change_count(), 3);
    }

    #[test]
    fn test_plan_without_inventory_has_no_creates() {
        let plan = plan(
            &desired(&[("w1", "alpha")]),
            &SnapshotConfig::new(),
            &LiveInventory::unavailable(),
        );

        assert!(!plan.inventory_available);
        assert!(plan.creates.is_empty());
        assert_eq!(plan.updates.len(), 1);
        assert!(plan.has_changes());
    }

    #[test]
    fn test_plan_rename_is_update_not_create() {
        let last: SnapshotConfig = [("w1".to_string(), entry("alpha", 1))].into();
        let plan = plan(&desired(&[("w1", "alpha-v2")]), &last, &live(&["alpha"]));

        assert!(plan.creates.is_empty());
        assert_eq!(plan.changed().count(), 1);
    }

    #[test]
    fn test_plan_removes_everything() {
        let last: SnapshotConfig = [
            ("w1".to_string(), entry("alpha", 1)),
            ("w2".to_string(), entry("beta", 2)),
        ]
        .into();

        let plan = plan(&BTreeMap::new(), &last, &live(&["alpha", "beta"]));
        assert!(plan.removes_everything());
        assert_eq!(plan.removals.len(), 2);

        let partial = super::plan(&desired(&[("w1", "alpha")]), &last, &live(&["alpha"]));
        assert!(!partial.removes_everything());

        let empty = super::plan(&BTreeMap::new(), &SnapshotConfig::new(), &live(&[]));
        assert!(!empty.removes_everything());
    }
}
