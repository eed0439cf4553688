//! Core types for the job API client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier the remote API assigns to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A job payload that knows its own display name.
///
/// The create batch uses the name to skip jobs that already exist remotely,
/// and echoes it back next to the identifier it was given.
pub trait NamedJob: Serialize {
    /// Display name of the job as the remote API knows it
    fn job_name(&self) -> &str;
}

/// A job created by a create batch, echoing the name it was created under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedJob {
    /// Display name sent in the create payload
    pub name: String,
    /// Identifier returned by the API
    pub job_id: JobId,
}

/// Per-item results of an update batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResults {
    /// One entry per job, in input order: `true` where its settings were replaced
    pub applied: Vec<bool>,
    /// Whether the identifiers and jobs had the same length
    pub paired: bool,
}

impl UpdateResults {
    /// `true` only if every item succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.paired && self.applied.iter().all(|ok| *ok)
    }

    /// Whether the job at `index` was updated.
    #[must_use]
    pub fn is_applied(&self, index: usize) -> bool {
        self.applied.get(index).copied().unwrap_or(false)
    }
}

/// One page of the job listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobsPage {
    /// Display names of the jobs on this page
    pub job_names: Vec<String>,
    /// Token for the next page, if there is one
    pub next_page_token: Option<String>,
}

/// API endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `GET` listing of jobs (paginated)
    pub list: String,
    /// `POST` creation of a job
    pub create: String,
    /// `POST` full replacement of a job's settings
    pub update: String,
    /// `POST` deletion of a job
    pub delete: String,
}

impl Endpoints {
    /// Derive the standard endpoints from an API base URL.
    #[must_use]
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            list: format!("{base}/api/2.1/jobs/list"),
            create: format!("{base}/api/2.1/jobs/create"),
            update: format!("{base}/api/2.1/jobs/reset"),
            delete: format!("{base}/api/2.1/jobs/delete"),
        }
    }
}

/// Connection settings for the HTTP backend.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bearer credential sent with every request
    pub token: String,
    /// Endpoint URLs
    pub endpoints: Endpoints,
    /// Overall per-request timeout (`None` = no timeout)
    pub timeout: Option<Duration>,
}

impl ApiConfig {
    /// Settings for `base_url` with default endpoints and no timeout.
    #[must_use]
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoints: Endpoints::from_base(base_url),
            timeout: None,
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
