//! Core data model: rendered jobs and persisted state snapshots

use jobsapi::{JobId, NamedJob};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Job-level email notification lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailNotifications {
    #[serde(default)]
    pub on_success: Vec<String>,
    #[serde(default)]
    pub on_failure: Vec<String>,
}

/// Cron schedule of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Quartz cron expression
    pub quartz_cron_expression: String,
    pub timezone_id: String,
    /// `UNPAUSED` or `PAUSED`
    pub pause_status: String,
}

/// One access-control entry granting a group a permission level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pub group_name: String,
    pub permission_level: String,
}

/// The fully-built wire payload for one workflow.
///
/// This is both the unit sent to create/update calls and the unit compared
/// for change detection. Task payloads are kept as JSON values since their
/// shape depends on the task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedJob {
    /// Job display name
    pub name: String,
    pub email_notifications: EmailNotifications,
    #[serde(default)]
    pub webhook_notifications: BTreeMap<String, Value>,
    #[serde(default)]
    pub timeout_seconds: u64,
    pub schedule: Schedule,
    pub max_concurrent_runs: u32,
    pub tasks: Vec<Value>,
    pub format: String,
    #[serde(default)]
    pub access_control_list: Vec<AccessControl>,
}

impl NamedJob for RenderedJob {
    fn job_name(&self) -> &str {
        &self.name
    }
}

/// A rendered job as recorded in a snapshot, with its remote identifier.
///
/// Serializes as the job's JSON object plus a `job_id` field. The identifier
/// never takes part in change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(flatten)]
    pub job: RenderedJob,
}

impl SnapshotEntry {
    pub fn new(job: RenderedJob, job_id: Option<JobId>) -> Self {
        Self { job_id, job }
    }
}

/// Workflow name to recorded entry.
pub type SnapshotConfig = BTreeMap<String, SnapshotEntry>;

/// Snapshot metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Version label, `major.minor`
    pub version: String,
    /// Local time of the commit, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
}

/// A versioned record of the last-applied configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub metadata: Metadata,
    #[serde(default)]
    pub config: SnapshotConfig,
}
