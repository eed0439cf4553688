//! Backend traits and implementations for talking to the job API.
//!
//! This module provides the [`Backend`] trait, one network call per method,
//! and two implementations: [`http::HttpBackend`] for the real API and
//! [`MockBackend`] for tests.
//!
//! # Testing
//!
//! ```
//! use jobsapi::backend::{Backend, MockBackend};
//!
//! let mock = MockBackend::new();
//! mock.add_job("nightly-etl");
//!
//! let page = mock.list_page(None).unwrap();
//! assert_eq!(page.job_names, vec!["nightly-etl"]);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{JobId, JobsPage};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Backend trait for job API calls.
///
/// Each method performs exactly one request. Batching, skipping and
/// aggregation live in [`crate::Client`].
pub trait Backend: Send + Sync {
    /// Fetch one page of the job listing.
    fn list_page(&self, page_token: Option<&str>) -> Result<JobsPage>;

    /// Create a job.
    ///
    /// Returns `Ok(None)` when the API accepted the request but returned no
    /// identifier.
    fn create(&self, payload: &Value) -> Result<Option<JobId>>;

    /// Replace all settings of an existing job.
    fn reset(&self, job_id: JobId, payload: &Value) -> Result<()>;

    /// Delete a job.
    fn delete(&self, job_id: JobId) -> Result<()>;
}

/// A call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `list_page` with the given token
    List(Option<String>),
    /// `create` of a job with the given name
    Create(String),
    /// `reset` of the given job
    Reset(JobId),
    /// `delete` of the given job
    Delete(JobId),
}

#[derive(Debug, Default)]
struct MockState {
    jobs: BTreeMap<JobId, Value>,
    next_id: u64,
    page_size: usize,
    fail_list: bool,
    fail_names: BTreeSet<String>,
    fail_ids: BTreeSet<JobId>,
    omit_ids: bool,
    calls: Vec<MockCall>,
}

/// Mock backend for testing without network access.
///
/// Keeps remote jobs in memory, hands out increasing identifiers starting at
/// 1, and records every call. Clones share state, so a test can keep one
/// handle while the client owns another.
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_id: 1,
                page_size: 25,
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add an existing remote job, returning its identifier.
    pub fn add_job(&self, name: &str) -> JobId {
        let mut state = self.lock();
        let id = JobId(state.next_id);
        state.next_id += 1;
        state.jobs.insert(id, serde_json::json!({ "name": name }));
        id
    }

    /// Number of job names returned per listing page.
    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = size.max(1);
    }

    /// Make listing fail.
    pub fn fail_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }

    /// Make create/reset fail for payloads carrying this job name.
    pub fn fail_job_name(&self, name: &str) {
        self.lock().fail_names.insert(name.to_string());
    }

    /// Make reset/delete fail for this job identifier.
    pub fn fail_job_id(&self, id: JobId) {
        self.lock().fail_ids.insert(id);
    }

    /// Clear every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_list = false;
        state.fail_names.clear();
        state.fail_ids.clear();
        state.omit_ids = false;
    }

    /// Accept creates without returning an identifier.
    pub fn omit_created_ids(&self, omit: bool) {
        self.lock().omit_ids = omit;
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls (remote jobs are kept).
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of create/reset/delete calls made so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| !matches!(c, MockCall::List(_)))
            .count()
    }

    /// Stored settings of a remote job.
    #[must_use]
    pub fn job(&self, id: JobId) -> Option<Value> {
        self.lock().jobs.get(&id).cloned()
    }

    /// Display names of all remote jobs, in identifier order.
    #[must_use]
    pub fn job_names(&self) -> Vec<String> {
        self.lock().jobs.values().map(name_of).collect()
    }
}

fn name_of(payload: &Value) -> String {
    payload
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn not_found(id: JobId) -> Error {
    Error::http(format!("job {id} does not exist"), Some(400))
}

impl Backend for MockBackend {
    fn list_page(&self, page_token: Option<&str>) -> Result<JobsPage> {
        let mut state = self.lock();
        state.calls.push(MockCall::List(page_token.map(str::to_string)));

        if state.fail_list {
            return Err(Error::http("mock listing failure", Some(503)));
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::http(format!("bad page token {token}"), Some(400)))?,
            None => 0,
        };
        let names: Vec<String> = state.jobs.values().map(name_of).collect();
        let end = (offset + state.page_size).min(names.len());
        let next_page_token = (end < names.len()).then(|| end.to_string());

        Ok(JobsPage {
            job_names: names.get(offset..end).unwrap_or_default().to_vec(),
            next_page_token,
        })
    }

    fn create(&self, payload: &Value) -> Result<Option<JobId>> {
        let mut state = self.lock();
        let name = name_of(payload);
        state.calls.push(MockCall::Create(name.clone()));

        if state.fail_names.contains(&name) {
            return Err(Error::http(format!("mock create failure for {name}"), Some(400)));
        }

        let id = JobId(state.next_id);
        state.next_id += 1;
        state.jobs.insert(id, payload.clone());

        Ok(if state.omit_ids { None } else { Some(id) })
    }

    fn reset(&self, job_id: JobId, payload: &Value) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Reset(job_id));

        if state.fail_ids.contains(&job_id) || state.fail_names.contains(&name_of(payload)) {
            return Err(Error::http(format!("mock reset failure for {job_id}"), Some(500)));
        }

        match state.jobs.get_mut(&job_id) {
            Some(job) => {
                *job = payload.clone();
                Ok(())
            }
            None => Err(not_found(job_id)),
        }
    }

    fn delete(&self, job_id: JobId) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Delete(job_id));

        if state.fail_ids.contains(&job_id) {
            return Err(Error::http(format!("mock delete failure for {job_id}"), Some(500)));
        }

        state
            .jobs
            .remove(&job_id)
            .map(|_| ())
            .ok_or_else(|| not_found(job_id))
    }
}
