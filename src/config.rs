//! Process settings
//!
//! Loaded from an optional TOML file. Every field has a default, so an
//! absent file is equivalent to an empty one.

use anyhow::{Context, Result};
use reconcile::{AccessControl, SnapshotLocation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// YAML file holding the workflow definitions
    pub workflow_file: Option<String>,
    pub api: ApiSettings,
    pub state: StateSettings,
    pub defaults: PayloadDefaults,
}

// ============================================================================
// API
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Per-request timeout in seconds (0 = none)
    pub timeout_secs: u64,
    pub list_endpoint: Option<String>,
    pub create_endpoint: Option<String>,
    pub update_endpoint: Option<String>,
    pub delete_endpoint: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.databricks.com".to_string(),
            timeout_secs: 60,
            list_endpoint: None,
            create_endpoint: None,
            update_endpoint: None,
            delete_endpoint: None,
        }
    }
}

impl ApiSettings {
    /// Connection settings for the job client
    pub fn client_config(&self, token: &str) -> jobsapi::ApiConfig {
        let mut config = jobsapi::ApiConfig::new(&self.base_url, token);
        if self.timeout_secs > 0 {
            config = config.timeout(Duration::from_secs(self.timeout_secs));
        }

        let endpoints = &mut config.endpoints;
        let overrides = [
            (&mut endpoints.list, &self.list_endpoint),
            (&mut endpoints.create, &self.create_endpoint),
            (&mut endpoints.update, &self.update_endpoint),
            (&mut endpoints.delete, &self.delete_endpoint),
        ];
        for (endpoint, custom) in overrides {
            if let Some(url) = custom {
                endpoint.clone_from(url);
            }
        }
        config
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// Root directory of the state store (defaults to the state dir)
    pub root: Option<String>,
    pub bucket: String,
    pub current_key: String,
    pub historic_prefix: String,
}

impl Default for StateSettings {
    fn default() -> Self {
        let location = SnapshotLocation::default();
        Self {
            root: None,
            bucket: location.bucket,
            current_key: location.current_key,
            historic_prefix: location.historic_prefix,
        }
    }
}

impl StateSettings {
    pub fn location(&self) -> SnapshotLocation {
        SnapshotLocation {
            bucket: self.bucket.clone(),
            current_key: self.current_key.clone(),
            historic_prefix: self.historic_prefix.clone(),
        }
    }

    pub fn root_path(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(paths::expand(root)),
            None => paths::state_dir(),
        }
    }
}

// ============================================================================
// Payload defaults
// ============================================================================

/// Values filled into every rendered job unless a workflow overrides them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadDefaults {
    pub timezone: String,
    pub pause_status: String,
    pub max_concurrent_runs: u32,
    pub access_control: Vec<AccessControl>,
    pub warehouse_id: String,
    /// PyPI requirement added to every DBT task
    pub dbt_library: String,
    /// Secret scope holding service-account keys
    pub secret_scope: String,
    /// Source of notebooks and scripts
    pub source: String,
}

impl Default for PayloadDefaults {
    fn default() -> Self {
        Self {
            timezone: "Europe/London".to_string(),
            pause_status: "UNPAUSED".to_string(),
            max_concurrent_runs: 1,
            access_control: vec![AccessControl {
                group_name: "Uk".to_string(),
                permission_level: "CAN_MANAGE".to_string(),
            }],
            warehouse_id: "warehouse_id".to_string(),
            dbt_library: "dbt-databricks>=1.0.0,<2.0.0".to_string(),
            secret_scope: "scope".to_string(),
            source: "GIT".to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Default workflow file when neither the CLI nor the settings name one
pub const DEFAULT_WORKFLOW_FILE: &str = "workflow/job_config.yaml";

impl Settings {
    /// Load settings from `explicit`, or from the config dir when present.
    ///
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = paths::config_file()?;
                if !path.exists() {
                    log::debug!("No settings file at {}; using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings = Self::parse(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The workflow file to use, preferring `cli` over the settings
    pub fn workflow_path(&self, cli: Option<&Path>) -> PathBuf {
        match (cli, &self.workflow_file) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(file)) => paths::expand(file),
            (None, None) => PathBuf::from(DEFAULT_WORKFLOW_FILE),
        }
    }
}
