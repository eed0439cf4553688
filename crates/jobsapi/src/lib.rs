//! # jobsapi
//!
//! Blocking client for a remote job-orchestration API.
//!
//! This crate provides:
//! - Paginated listing of remote job names
//! - Batch create, update (full settings reset) and delete of jobs
//! - A [`backend::MockBackend`] for exercising all of the above offline
//!
//! Batches iterate their items sequentially, one request per item. A failed
//! item is logged and recorded, never fatal: every item is attempted and the
//! batch reports which of them succeeded.
//!
//! ## Example
//!
//! ```no_run
//! use jobsapi::{ApiConfig, Client, JobId};
//!
//! let client = Client::new(&ApiConfig::new("https://api.example.com", "token"));
//!
//! match client.list_job_names() {
//!     Some(names) => println!("{} jobs", names.len()),
//!     None => eprintln!("listing failed"),
//! }
//!
//! let ok = client.delete_batch(&[Some(JobId(42))]);
//! println!("delete succeeded: {ok}");
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::{MockBackend, MockCall};
pub use error::{Error, ErrorCategory, Result};
pub use types::{ApiConfig, CreatedJob, Endpoints, JobId, JobsPage, NamedJob, UpdateResults};

use backend::Backend;
use backend::http::HttpBackend;
use serde::Serialize;
use std::collections::BTreeSet;

/// High-level client for job API operations.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client talking HTTP to the configured endpoints.
    #[must_use]
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            backend: Box::new(HttpBackend::new(config)),
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// Retrieve the display names of all remote jobs.
    ///
    /// Follows `next_page_token` until exhausted. Returns `None` when any
    /// page fails, which is distinct from an empty inventory.
    pub fn list_job_names(&self) -> Option<Vec<String>> {
        let mut names = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = match self.backend.list_page(token.as_deref()) {
                Ok(page) => page,
                Err(e) => {
                    log::error!("Failed to list jobs: {} ({})", e, e.category().advice());
                    return None;
                }
            };

            names.extend(page.job_names);

            match page.next_page_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    log::error!("Job listing returned the same page token twice: {next}");
                    return None;
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        log::debug!("Listed {} remote jobs", names.len());
        Some(names)
    }

    // =========================================================================
    // Batch mutations
    // =========================================================================

    /// Create every job whose name is not already in `existing`.
    ///
    /// Returns the jobs actually created, each echoing the name it was
    /// created under, in input order. Skipped and failed jobs contribute
    /// nothing.
    pub fn create_batch<J: NamedJob>(
        &self,
        existing: &BTreeSet<String>,
        jobs: &[J],
    ) -> Vec<CreatedJob> {
        let mut created = Vec::new();

        for job in jobs {
            let name = job.job_name();
            if existing.contains(name) {
                log::info!("Job {name} already exists, not creating");
                continue;
            }

            let payload = match encode(job) {
                Ok(payload) => payload,
                Err(e) => {
                    log::error!("Failed to create job {name}: {e}");
                    continue;
                }
            };

            match self.backend.create(&payload) {
                Ok(Some(job_id)) => {
                    log::info!("Created job {name} with ID {job_id}");
                    created.push(CreatedJob {
                        name: name.to_string(),
                        job_id,
                    });
                }
                Ok(None) => log::error!("Failed to create job {name}: no job ID returned"),
                Err(e) => log::error!("Failed to create job {name}: {} ({})", e, e.category()),
            }
        }

        created
    }

    /// Replace the settings of each job, pairing `ids[i]` with `jobs[i]`.
    ///
    /// Reports, per job, whether it was updated. A missing identifier fails
    /// its item without a request. Mismatched lengths fail the batch, though
    /// all pairable items are still attempted.
    pub fn update_batch<J: Serialize>(
        &self,
        ids: &[Option<JobId>],
        jobs: &[J],
    ) -> UpdateResults {
        let paired = ids.len() == jobs.len();
        if !paired {
            log::error!(
                "Update batch has {} IDs for {} jobs; pairing by position",
                ids.len(),
                jobs.len()
            );
        }

        let mut applied = vec![false; jobs.len()];
        for ((id, job), ok) in ids.iter().zip(jobs).zip(applied.iter_mut()) {
            let Some(job_id) = id else {
                log::error!("Failed to update job: no job ID recorded");
                continue;
            };

            let result = encode(job).and_then(|payload| self.backend.reset(*job_id, &payload));
            match result {
                Ok(()) => {
                    log::info!("Updated job with ID {job_id}");
                    *ok = true;
                }
                Err(e) => {
                    log::error!("Failed to update job with ID {job_id}: {} ({})", e, e.category());
                }
            }
        }

        UpdateResults { applied, paired }
    }

    /// Delete each job.
    ///
    /// Returns `true` only if every item succeeded. A missing identifier
    /// fails its item without a request.
    pub fn delete_batch(&self, ids: &[Option<JobId>]) -> bool {
        let mut success = true;

        for id in ids {
            let Some(job_id) = id else {
                log::error!("Failed to delete job: no job ID recorded");
                success = false;
                continue;
            };

            match self.backend.delete(*job_id) {
                Ok(()) => log::info!("Deleted job {job_id}"),
                Err(e) => {
                    log::error!("Failed to delete job {job_id}: {} ({})", e, e.category());
                    success = false;
                }
            }
        }

        success
    }
}

fn encode<J: Serialize>(job: &J) -> Result<serde_json::Value> {
    serde_json::to_value(job).map_err(|e| Error::Encode(e.to_string()))
}
