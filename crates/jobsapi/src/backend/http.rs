//! HTTP backend for the remote job API.
//!
//! Requests are blocking and authenticated with a bearer token. Non-2xx
//! responses surface as [`crate::Error::Http`] with the status code attached.

use crate::backend::Backend;
use crate::error::Result;
use crate::types::{ApiConfig, Endpoints, JobId, JobsPage};
use serde::Deserialize;
use serde_json::{Value, json};

/// Name reported for listed jobs that carry no settings name.
pub const UNKNOWN_JOB_NAME: &str = "unknown job name";

/// HTTP backend built on a `ureq` agent.
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Endpoint URLs.
    endpoints: Endpoints,
    /// Pre-rendered `Authorization` header value.
    authorization: String,
}

impl HttpBackend {
    /// Create a backend from connection settings.
    #[must_use]
    pub fn new(config: &ApiConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(config.timeout)
            .build()
            .into();

        Self {
            agent,
            endpoints: config.endpoints.clone(),
            authorization: format!("Bearer {}", config.token),
        }
    }

    /// Endpoint URLs in use.
    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn post(&self, url: &str, body: &Value) -> Result<ureq::http::Response<ureq::Body>> {
        let response = self
            .agent
            .post(url)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
            .send_json(body)?;
        Ok(response)
    }
}

impl Backend for HttpBackend {
    fn list_page(&self, page_token: Option<&str>) -> Result<JobsPage> {
        let mut request = self
            .agent
            .get(&self.endpoints.list)
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json");
        if let Some(token) = page_token {
            request = request.query("page_token", token);
        }

        let response: ListResponse = request.call()?.body_mut().read_json()?;
        Ok(response.into())
    }

    fn create(&self, payload: &Value) -> Result<Option<JobId>> {
        let response: CreateResponse = self
            .post(&self.endpoints.create, payload)?
            .body_mut()
            .read_json()?;
        Ok(response.job_id)
    }

    fn reset(&self, job_id: JobId, payload: &Value) -> Result<()> {
        let body = json!({
            "job_id": job_id,
            "new_settings": payload,
        });
        self.post(&self.endpoints.update, &body)?;
        Ok(())
    }

    fn delete(&self, job_id: JobId) -> Result<()> {
        self.post(&self.endpoints.delete, &json!({ "job_id": job_id }))?;
        Ok(())
    }
}

// =============================================================================
// API response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    jobs: Vec<ListedJob>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedJob {
    #[serde(default)]
    settings: Option<ListedSettings>,
}

#[derive(Debug, Deserialize)]
struct ListedSettings {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    job_id: Option<JobId>,
}

impl From<ListResponse> for JobsPage {
    fn from(r: ListResponse) -> Self {
        Self {
            job_names: r
                .jobs
                .into_iter()
                .map(|job| {
                    job.settings
                        .and_then(|s| s.name)
                        .unwrap_or_else(|| UNKNOWN_JOB_NAME.to_string())
                })
                .collect(),
            next_page_token: r.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}
