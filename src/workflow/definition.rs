//! Workflow and task definitions as written in the YAML file

use reconcile::AccessControl;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One workflow: a named job made of ordered tasks.
///
/// List fields are optional so that a bare `key:` in YAML reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WorkflowDefinition {
    pub job_name: Option<String>,
    pub tasks: Option<Vec<TaskDefinition>>,
    /// Quartz cron expression
    pub schedule: Option<String>,
    pub email_on_success: Option<Vec<String>>,
    pub email_on_failure: Option<Vec<String>>,
    pub access_control: Option<Vec<AccessControl>>,
    pub timezone: Option<String>,
    pub max_concurrent_runs: Option<u32>,
}

impl WorkflowDefinition {
    pub fn tasks(&self) -> &[TaskDefinition] {
        self.tasks.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskDefinition {
    pub task_name: Option<String>,
    /// Raw task type; parsed into [`TaskType`] when rendering
    pub tasktype: Option<String>,
    pub filepath: Option<String>,
    /// Key of a task in the same workflow that must finish first
    pub depends_on: Option<String>,
    /// JSON file holding the cluster spec, relative to the working directory
    pub cluster_config_path: Option<String>,
    pub libraries: Option<Vec<Value>>,
    pub gcp_connection: Option<GcpConnection>,
    pub email_on_success: Option<Vec<String>>,
    pub email_on_failure: Option<Vec<String>>,
    pub timeout_seconds: Option<u64>,
    /// Script arguments (PYTHON)
    pub parameters: Option<Vec<Value>>,
    /// dbt commands (DBT)
    pub commands: Option<Vec<String>>,
    /// SQL warehouse (SQL, DBT)
    pub warehouse_id: Option<String>,
}

/// Service-account credentials injected into the task cluster's Spark conf
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GcpConnection {
    pub service_account_email: String,
    pub project_id: String,
    /// Secret name of the private key in the secret scope
    pub service_account_private_key: String,
    /// Secret name of the private key id in the secret scope
    pub service_account_private_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Notebook,
    Python,
    Sql,
    Dbt,
}

impl TaskType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notebook => "NOTEBOOK",
            Self::Python => "PYTHON",
            Self::Sql => "SQL",
            Self::Dbt => "DBT",
        }
    }

    /// Whether the task runs on a Spark cluster that can carry GCP credentials
    pub const fn uses_spark_conf(self) -> bool {
        matches!(self, Self::Notebook | Self::Python)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOTEBOOK" => Ok(Self::Notebook),
            "PYTHON" => Ok(Self::Python),
            "SQL" => Ok(Self::Sql),
            "DBT" => Ok(Self::Dbt),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_round_trip() {
        for task_type in [TaskType::Notebook, TaskType::Python, TaskType::Sql, TaskType::Dbt] {
            assert_eq!(task_type.as_str().parse::<TaskType>(), Ok(task_type));
        }
        assert!("notebook".parse::<TaskType>().is_err());
        assert!("SPARK".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_spark_conf_task_types() {
        assert!(TaskType::Notebook.uses_spark_conf());
        assert!(TaskType::Python.uses_spark_conf());
        assert!(!TaskType::Sql.uses_spark_conf());
        assert!(!TaskType::Dbt.uses_spark_conf());
    }

    #[test]
    fn test_null_lists_read_as_none() {
        let yaml = "job_name: alpha\ntasks:\nemail_on_success:\n";
        let def: WorkflowDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.job_name.as_deref(), Some("alpha"));
        assert!(def.tasks().is_empty());
        assert!(def.email_on_success.is_none());
    }

    #[test]
    fn test_full_task_definition() {
        let yaml = r"
task_name: load
tasktype: PYTHON
filepath: jobs/load.py
depends_on: extract
parameters: [--date, 2024]
libraries:
  - pypi:
      package: requests
gcp_connection:
  service_account_email: sa@example.iam
  project_id: proj
  service_account_private_key: key
  service_account_private_id: key-id
";
        let task: TaskDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(task.task_name.as_deref(), Some("load"));
        assert_eq!(task.depends_on.as_deref(), Some("extract"));
        assert_eq!(task.parameters.as_ref().map(Vec::len), Some(2));
        assert_eq!(task.libraries.as_ref().map(Vec::len), Some(1));
        assert_eq!(task.gcp_connection.unwrap().project_id, "proj");
    }
}
