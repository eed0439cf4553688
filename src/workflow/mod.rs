//! Workflow definitions
//!
//! Loads the workflow YAML file and renders each definition into the job
//! payload the remote API receives.

mod definition;
mod loader;
mod payload;

pub use definition::{TaskType, WorkflowDefinition};
pub use loader::{load, workflows};
pub use payload::render_workflows;

use anyhow::{Context, Result};
use reconcile::RenderedJob;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::PayloadDefaults;

/// Load `path` and render every workflow in it.
///
/// Fails before any remote call when the file is unreadable or a definition
/// is invalid.
pub fn load_desired(
    path: &Path,
    defaults: &PayloadDefaults,
) -> Result<BTreeMap<String, RenderedJob>> {
    let raw = load(path)?;
    let definitions = workflows(&raw)?;
    render_workflows(&definitions, defaults)
        .with_context(|| format!("Invalid workflow definitions in {}", path.display()))
}

/// Authoring errors in the workflow file.
///
/// Raised while rendering payloads, before any remote call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("workflow '{workflow}': {reason}")]
    InvalidWorkflow { workflow: String, reason: String },

    #[error("workflow '{workflow}' has no job_name")]
    MissingJobName { workflow: String },

    #[error("workflow '{workflow}': task #{index} has no task_name")]
    MissingTaskName { workflow: String, index: usize },

    #[error("workflow '{workflow}': task '{task}' has no tasktype")]
    MissingTaskType { workflow: String, task: String },

    #[error(
        "workflow '{workflow}': task '{task}' has unknown tasktype '{tasktype}' (expected NOTEBOOK, PYTHON, SQL or DBT)"
    )]
    UnknownTaskType {
        workflow: String,
        task: String,
        tasktype: String,
    },

    #[error("workflow '{workflow}': {tasktype} task '{task}' requires a filepath")]
    MissingFilepath {
        workflow: String,
        task: String,
        tasktype: TaskType,
    },

    #[error("workflow '{workflow}': task '{task}': cluster config {}: {reason}", path.display())]
    ClusterConfig {
        workflow: String,
        task: String,
        path: PathBuf,
        reason: String,
    },

    #[error("workflow '{workflow}': task key '{task}' is used more than once")]
    DuplicateTaskKey { workflow: String, task: String },

    #[error("workflow '{workflow}': task '{task}' depends on unknown task '{depends_on}'")]
    DanglingDependency {
        workflow: String,
        task: String,
        depends_on: String,
    },

    #[error("workflow '{workflow}': task '{task}' depends on itself")]
    SelfDependency { workflow: String, task: String },
}
