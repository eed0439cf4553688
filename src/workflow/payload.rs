//! Rendering workflow definitions into job payloads

use reconcile::{EmailNotifications, RenderedJob, Schedule};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use super::definition::{GcpConnection, TaskDefinition, TaskType, WorkflowDefinition};
use super::ConfigError;
use crate::config::PayloadDefaults;
use crate::paths;

const JOB_FORMAT: &str = "MULTI_TASK";

/// Render every workflow, failing on the first authoring error
pub fn render_workflows(
    definitions: &BTreeMap<String, WorkflowDefinition>,
    defaults: &PayloadDefaults,
) -> Result<BTreeMap<String, RenderedJob>, ConfigError> {
    definitions
        .iter()
        .map(|(name, definition)| {
            log::info!("Processing workflow: {name}");
            render_job(name, definition, defaults).map(|job| (name.clone(), job))
        })
        .collect()
}

/// Render one workflow into the job payload sent to the API.
///
/// Job-level email lists hold the workflow's own addresses followed by each
/// task's, in task order.
pub fn render_job(
    workflow: &str,
    definition: &WorkflowDefinition,
    defaults: &PayloadDefaults,
) -> Result<RenderedJob, ConfigError> {
    let name = definition
        .job_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ConfigError::MissingJobName {
            workflow: workflow.to_string(),
        })?;

    check_task_graph(workflow, definition.tasks())?;

    let mut emails = EmailNotifications {
        on_success: definition.email_on_success.clone().unwrap_or_default(),
        on_failure: definition.email_on_failure.clone().unwrap_or_default(),
    };
    let mut tasks = Vec::with_capacity(definition.tasks().len());

    for (index, task) in definition.tasks().iter().enumerate() {
        tasks.push(render_task(workflow, index, task, defaults)?);
        emails
            .on_success
            .extend(task.email_on_success.iter().flatten().cloned());
        emails
            .on_failure
            .extend(task.email_on_failure.iter().flatten().cloned());
    }

    if tasks.is_empty() {
        log::warn!("Workflow '{workflow}' has no tasks");
    }

    Ok(RenderedJob {
        name: name.to_string(),
        email_notifications: emails,
        webhook_notifications: BTreeMap::new(),
        timeout_seconds: 0,
        schedule: Schedule {
            quartz_cron_expression: definition.schedule.clone().unwrap_or_default(),
            timezone_id: definition
                .timezone
                .clone()
                .unwrap_or_else(|| defaults.timezone.clone()),
            pause_status: defaults.pause_status.clone(),
        },
        max_concurrent_runs: definition
            .max_concurrent_runs
            .unwrap_or(defaults.max_concurrent_runs),
        tasks,
        format: JOB_FORMAT.to_string(),
        access_control_list: definition
            .access_control
            .clone()
            .unwrap_or_else(|| defaults.access_control.clone()),
    })
}

/// Render one task payload. `index` is the task's position in the workflow.
pub fn render_task(
    workflow: &str,
    index: usize,
    task: &TaskDefinition,
    defaults: &PayloadDefaults,
) -> Result<Value, ConfigError> {
    let key = task_key(workflow, index, task)?;
    let task_type = task_type(workflow, &key, task)?;

    let filepath = task
        .filepath
        .as_deref()
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ConfigError::MissingFilepath {
            workflow: workflow.to_string(),
            task: key.clone(),
            tasktype: task_type,
        })?;

    let mut cluster = load_cluster(workflow, &key, task.cluster_config_path.as_deref())?;
    if let Some(gcp) = &task.gcp_connection {
        if task_type.uses_spark_conf() {
            add_gcp_spark_conf(&mut cluster, gcp, &defaults.secret_scope).map_err(|reason| {
                ConfigError::ClusterConfig {
                    workflow: workflow.to_string(),
                    task: key.clone(),
                    path: paths::expand(task.cluster_config_path.as_deref().unwrap_or_default()),
                    reason,
                }
            })?;
        } else {
            log::warn!("Ignoring gcp_connection on {task_type} task '{key}'");
        }
    }

    let mut libraries = Vec::new();
    let mut payload = Map::new();
    let warehouse_id = task
        .warehouse_id
        .clone()
        .unwrap_or_else(|| defaults.warehouse_id.clone());

    match task_type {
        TaskType::Notebook => {
            payload.insert(
                "notebook_task".to_string(),
                json!({ "notebook_path": filepath, "source": defaults.source }),
            );
        }
        TaskType::Python => {
            payload.insert(
                "spark_python_task".to_string(),
                json!({
                    "python_file": filepath,
                    "parameters": task.parameters.clone().unwrap_or_default(),
                    "source": defaults.source,
                }),
            );
        }
        TaskType::Sql => {
            payload.insert(
                "sql_task".to_string(),
                json!({ "file": { "path": filepath }, "warehouse_id": warehouse_id }),
            );
        }
        TaskType::Dbt => {
            payload.insert(
                "dbt_task".to_string(),
                json!({
                    "project_directory": filepath,
                    "commands": task.commands.clone().unwrap_or_default(),
                    "warehouse_id": warehouse_id,
                }),
            );
            libraries.push(json!({ "pypi": { "package": defaults.dbt_library } }));
        }
    }

    libraries.extend(task.libraries.iter().flatten().cloned());

    payload.insert("task_key".to_string(), Value::String(key.clone()));
    payload.insert("new_cluster".to_string(), Value::Object(cluster));
    payload.insert("libraries".to_string(), Value::Array(libraries));
    payload.insert(
        "timeout_seconds".to_string(),
        Value::from(task.timeout_seconds.unwrap_or(0)),
    );
    payload.insert(
        "email_notifications".to_string(),
        json!({
            "on_success": task.email_on_success.clone().unwrap_or_default(),
            "on_failure": task.email_on_failure.clone().unwrap_or_default(),
        }),
    );
    if let Some(upstream) = task.depends_on.as_deref().filter(|d| !d.is_empty()) {
        payload.insert("depends_on".to_string(), json!([{ "task_key": upstream }]));
    }

    log::debug!("Rendered {task_type} task '{key}' of workflow '{workflow}'");
    Ok(Value::Object(payload))
}

fn task_key(workflow: &str, index: usize, task: &TaskDefinition) -> Result<String, ConfigError> {
    task.task_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingTaskName {
            workflow: workflow.to_string(),
            index: index + 1,
        })
}

fn task_type(workflow: &str, key: &str, task: &TaskDefinition) -> Result<TaskType, ConfigError> {
    let raw = task
        .tasktype
        .as_deref()
        .ok_or_else(|| ConfigError::MissingTaskType {
            workflow: workflow.to_string(),
            task: key.to_string(),
        })?;
    raw.parse().map_err(|()| ConfigError::UnknownTaskType {
        workflow: workflow.to_string(),
        task: key.to_string(),
        tasktype: raw.to_string(),
    })
}

/// Task keys must be unique and `depends_on` must name another task
fn check_task_graph(workflow: &str, tasks: &[TaskDefinition]) -> Result<(), ConfigError> {
    let mut keys = BTreeSet::new();
    for (index, task) in tasks.iter().enumerate() {
        let key = task_key(workflow, index, task)?;
        if !keys.insert(key.clone()) {
            return Err(ConfigError::DuplicateTaskKey {
                workflow: workflow.to_string(),
                task: key,
            });
        }
    }

    for task in tasks {
        let (Some(key), Some(upstream)) = (&task.task_name, &task.depends_on) else {
            continue;
        };
        if upstream.is_empty() {
            continue;
        }
        if upstream == key {
            return Err(ConfigError::SelfDependency {
                workflow: workflow.to_string(),
                task: key.clone(),
            });
        }
        if !keys.contains(upstream) {
            return Err(ConfigError::DanglingDependency {
                workflow: workflow.to_string(),
                task: key.clone(),
                depends_on: upstream.clone(),
            });
        }
    }
    Ok(())
}

/// Read the cluster spec, or an empty one when no path is given
fn load_cluster(
    workflow: &str,
    key: &str,
    path: Option<&str>,
) -> Result<Map<String, Value>, ConfigError> {
    let Some(raw) = path.filter(|p| !p.is_empty()) else {
        return Ok(Map::new());
    };

    let path = paths::expand(raw);
    let error = |reason: String| ConfigError::ClusterConfig {
        workflow: workflow.to_string(),
        task: key.to_string(),
        path: path.clone(),
        reason,
    };

    let content = fs::read_to_string(&path).map_err(|e| error(e.to_string()))?;
    match serde_json::from_str(&content).map_err(|e| error(e.to_string()))? {
        Value::Object(cluster) => Ok(cluster),
        _ => Err(error("expected a JSON object".to_string())),
    }
}

/// Merge service-account settings into the cluster's `spark_conf`
fn add_gcp_spark_conf(
    cluster: &mut Map<String, Value>,
    gcp: &GcpConnection,
    scope: &str,
) -> Result<(), String> {
    let conf = cluster
        .entry("spark_conf")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(conf) = conf else {
        return Err("spark_conf is not an object".to_string());
    };

    let secret = |name: &str| format!("{{{{secrets/{scope}/{name}}}}}");
    let entries = [
        ("spark.hadoop.google.cloud.auth.service.account.enable", "true".to_string()),
        ("spark.hadoop.fs.gs.auth.service.account.email", gcp.service_account_email.clone()),
        ("spark.hadoop.fs.gs.project.id", gcp.project_id.clone()),
        (
            "spark.hadoop.fs.gs.auth.service.account.private.key",
            secret(&gcp.service_account_private_key),
        ),
        (
            "spark.hadoop.fs.gs.auth.service.account.private.key.id",
            secret(&gcp.service_account_private_id),
        ),
    ];
    for (name, value) in entries {
        conf.insert(name.to_string(), Value::String(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn defaults() -> PayloadDefaults {
        PayloadDefaults::default()
    }

    fn task(name: &str, tasktype: &str, filepath: &str) -> TaskDefinition {
        TaskDefinition {
            task_name: Some(name.to_string()),
            tasktype: Some(tasktype.to_string()),
            filepath: Some(filepath.to_string()),
            ..TaskDefinition::default()
        }
    }

    fn workflow(job_name: &str, tasks: Vec<TaskDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            job_name: Some(job_name.to_string()),
            tasks: Some(tasks),
            schedule: Some("0 0 6 * * ?".to_string()),
            ..WorkflowDefinition::default()
        }
    }

    fn gcp() -> GcpConnection {
        GcpConnection {
            service_account_email: "sa@proj.iam".to_string(),
            project_id: "proj".to_string(),
            service_account_private_key: "pk".to_string(),
            service_account_private_id: "pk-id".to_string(),
        }
    }

    fn render(task: &TaskDefinition) -> Result<Value, ConfigError> {
        render_task("workflow_a", 0, task, &defaults())
    }

    #[test]
    fn test_notebook_task() {
        let payload = render(&task("ingest", "NOTEBOOK", "notebooks/ingest")).unwrap();
        assert_eq!(
            payload,
            json!({
                "task_key": "ingest",
                "notebook_task": {"notebook_path": "notebooks/ingest", "source": "GIT"},
                "new_cluster": {},
                "libraries": [],
                "timeout_seconds": 0,
                "email_notifications": {"on_success": [], "on_failure": []}
            })
        );
    }

    #[test]
    fn test_python_task_with_dependency() {
        let mut def = task("load", "PYTHON", "jobs/load.py");
        def.parameters = Some(vec![json!("--full")]);
        def.depends_on = Some("extract".to_string());
        def.timeout_seconds = Some(600);

        let payload = render(&def).unwrap();
        assert_eq!(
            payload["spark_python_task"],
            json!({"python_file": "jobs/load.py", "parameters": ["--full"], "source": "GIT"})
        );
        assert_eq!(payload["depends_on"], json!([{"task_key": "extract"}]));
        assert_eq!(payload["timeout_seconds"], json!(600));
    }

    #[test]
    fn test_sql_task_uses_file_path_and_warehouse() {
        let mut def = task("report", "SQL", "queries/report.sql");
        let payload = render(&def).unwrap();
        assert_eq!(
            payload["sql_task"],
            json!({"file": {"path": "queries/report.sql"}, "warehouse_id": "warehouse_id"})
        );

        def.warehouse_id = Some("wh-42".to_string());
        let payload = render(&def).unwrap();
        assert_eq!(payload["sql_task"]["warehouse_id"], json!("wh-42"));
    }

    #[test]
    fn test_dbt_task_prepends_adapter_library() {
        let mut def = task("models", "DBT", "dbt/project");
        def.commands = Some(vec!["dbt run".to_string()]);
        def.libraries = Some(vec![json!({"pypi": {"package": "extra"}})]);

        let payload = render(&def).unwrap();
        assert_eq!(
            payload["dbt_task"],
            json!({"project_directory": "dbt/project", "commands": ["dbt run"], "warehouse_id": "warehouse_id"})
        );
        assert_eq!(
            payload["libraries"],
            json!([
                {"pypi": {"package": "dbt-databricks>=1.0.0,<2.0.0"}},
                {"pypi": {"package": "extra"}}
            ])
        );
    }

    #[test]
    fn test_task_validation_errors() {
        let mut def = task("t", "NOTEBOOK", "nb");
        def.task_name = None;
        assert!(matches!(render(&def), Err(ConfigError::MissingTaskName { index: 1, .. })));

        let mut def = task("t", "NOTEBOOK", "nb");
        def.tasktype = None;
        assert!(matches!(render(&def), Err(ConfigError::MissingTaskType { .. })));

        let def = task("t", "SPARK_JAR", "nb");
        assert!(matches!(
            render(&def),
            Err(ConfigError::UnknownTaskType { ref tasktype, .. }) if tasktype == "SPARK_JAR"
        ));

        let def = task("t", "SQL", "");
        assert!(matches!(
            render(&def),
            Err(ConfigError::MissingFilepath { tasktype: TaskType::Sql, .. })
        ));
    }

    #[test]
    fn test_cluster_config_loaded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cluster.json");
        fs::write(&path, r#"{"spark_version": "13.3.x", "num_workers": 2}"#).unwrap();

        let mut def = task("t", "NOTEBOOK", "nb");
        def.cluster_config_path = Some(path.to_string_lossy().into_owned());

        let payload = render(&def).unwrap();
        assert_eq!(
            payload["new_cluster"],
            json!({"spark_version": "13.3.x", "num_workers": 2})
        );
    }

    #[test]
    fn test_cluster_config_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.json");
        let broken = temp.path().join("broken.json");
        let list = temp.path().join("list.json");
        fs::write(&broken, "{ nope").unwrap();
        fs::write(&list, "[1, 2]").unwrap();

        for path in [missing, broken, list] {
            let mut def = task("t", "NOTEBOOK", "nb");
            def.cluster_config_path = Some(path.to_string_lossy().into_owned());
            assert!(matches!(render(&def), Err(ConfigError::ClusterConfig { .. })));
        }
    }

    #[test]
    fn test_gcp_connection_adds_spark_conf() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cluster.json");
        fs::write(&path, r#"{"spark_conf": {"spark.speculation": "true"}}"#).unwrap();

        let mut def = task("t", "PYTHON", "job.py");
        def.cluster_config_path = Some(path.to_string_lossy().into_owned());
        def.gcp_connection = Some(gcp());

        let payload = render(&def).unwrap();
        let conf = &payload["new_cluster"]["spark_conf"];
        assert_eq!(conf["spark.speculation"], json!("true"));
        assert_eq!(conf["spark.hadoop.google.cloud.auth.service.account.enable"], json!("true"));
        assert_eq!(conf["spark.hadoop.fs.gs.auth.service.account.email"], json!("sa@proj.iam"));
        assert_eq!(conf["spark.hadoop.fs.gs.project.id"], json!("proj"));
        assert_eq!(
            conf["spark.hadoop.fs.gs.auth.service.account.private.key"],
            json!("{{secrets/scope/pk}}")
        );
        assert_eq!(
            conf["spark.hadoop.fs.gs.auth.service.account.private.key.id"],
            json!("{{secrets/scope/pk-id}}")
        );
    }

    #[test]
    fn test_gcp_connection_creates_spark_conf() {
        let mut def = task("t", "NOTEBOOK", "nb");
        def.gcp_connection = Some(gcp());

        let payload = render(&def).unwrap();
        assert_eq!(
            payload["new_cluster"]["spark_conf"]["spark.hadoop.fs.gs.project.id"],
            json!("proj")
        );
    }

    #[test]
    fn test_gcp_connection_ignored_for_sql() {
        let mut def = task("t", "SQL", "q.sql");
        def.gcp_connection = Some(gcp());

        let payload = render(&def).unwrap();
        assert_eq!(payload["new_cluster"], json!({}));
    }

    #[test]
    fn test_render_job_defaults_and_emails() {
        let mut first = task("extract", "NOTEBOOK", "nb/extract");
        first.email_on_failure = Some(vec!["task1@example.com".to_string()]);
        let mut second = task("load", "PYTHON", "load.py");
        second.depends_on = Some("extract".to_string());
        second.email_on_failure = Some(vec!["task2@example.com".to_string()]);

        let mut def = workflow("alpha", vec![first, second]);
        def.email_on_failure = Some(vec!["team@example.com".to_string()]);

        let job = render_job("workflow_a", &def, &defaults()).unwrap();
        assert_eq!(job.name, "alpha");
        assert_eq!(
            job.email_notifications.on_failure,
            vec!["team@example.com", "task1@example.com", "task2@example.com"]
        );
        assert!(job.email_notifications.on_success.is_empty());
        assert_eq!(job.schedule.quartz_cron_expression, "0 0 6 * * ?");
        assert_eq!(job.schedule.timezone_id, "Europe/London");
        assert_eq!(job.schedule.pause_status, "UNPAUSED");
        assert_eq!(job.max_concurrent_runs, 1);
        assert_eq!(job.format, "MULTI_TASK");
        assert_eq!(job.timeout_seconds, 0);
        assert!(job.webhook_notifications.is_empty());
        assert_eq!(job.access_control_list, defaults().access_control);
        assert_eq!(job.tasks.len(), 2);
        assert_eq!(job.tasks[1]["task_key"], json!("load"));
    }

    #[test]
    fn test_render_job_overrides() {
        let mut def = workflow("alpha", vec![task("t", "NOTEBOOK", "nb")]);
        def.timezone = Some("UTC".to_string());
        def.max_concurrent_runs = Some(3);

        let job = render_job("workflow_a", &def, &defaults()).unwrap();
        assert_eq!(job.schedule.timezone_id, "UTC");
        assert_eq!(job.max_concurrent_runs, 3);
    }

    #[test]
    fn test_render_job_is_deterministic() {
        let def = workflow("alpha", vec![task("t", "DBT", "dbt")]);
        let a = render_job("workflow_a", &def, &defaults()).unwrap();
        let b = render_job("workflow_a", &def, &defaults()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_job_requires_name() {
        let def = WorkflowDefinition::default();
        assert!(matches!(
            render_job("workflow_a", &def, &defaults()),
            Err(ConfigError::MissingJobName { .. })
        ));
    }

    #[test]
    fn test_task_graph_errors() {
        let def = workflow("alpha", vec![task("t", "NOTEBOOK", "a"), task("t", "NOTEBOOK", "b")]);
        assert!(matches!(
            render_job("w", &def, &defaults()),
            Err(ConfigError::DuplicateTaskKey { .. })
        ));

        let mut dangling = task("t", "NOTEBOOK", "a");
        dangling.depends_on = Some("ghost".to_string());
        let def = workflow("alpha", vec![dangling]);
        assert!(matches!(
            render_job("w", &def, &defaults()),
            Err(ConfigError::DanglingDependency { ref depends_on, .. }) if depends_on == "ghost"
        ));

        let mut looped = task("t", "NOTEBOOK", "a");
        looped.depends_on = Some("t".to_string());
        let def = workflow("alpha", vec![looped]);
        assert!(matches!(
            render_job("w", &def, &defaults()),
            Err(ConfigError::SelfDependency { .. })
        ));
    }

    #[test]
    fn test_render_workflows_stops_on_error() {
        let mut definitions = BTreeMap::new();
        definitions.insert("workflow_a".to_string(), workflow("alpha", vec![task("t", "NOTEBOOK", "nb")]));
        let rendered = render_workflows(&definitions, &defaults()).unwrap();
        assert_eq!(rendered["workflow_a"].name, "alpha");

        definitions.insert("workflow_b".to_string(), WorkflowDefinition::default());
        assert!(render_workflows(&definitions, &defaults()).is_err());
    }
}
