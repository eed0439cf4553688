//! Offline check of the workflow file (`jobsync validate`)

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::Context;
use crate::cli::FileArgs;
use crate::config::PayloadDefaults;
use crate::ui;
use crate::workflow::{self, WorkflowDefinition};

/// What validation found for one workflow
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkflowSummary {
    workflow: String,
    job_name: String,
    task_types: Vec<String>,
    schedule: String,
}

pub fn run(ctx: &Context, args: &FileArgs) -> Result<()> {
    let settings = ctx.settings()?;
    let path = settings.workflow_path(args.file.as_deref());
    let summaries = summarize(&path, &settings.defaults)?;

    if summaries.is_empty() {
        ui::warn(&format!("No workflows found in {}", path.display()));
        return Ok(());
    }

    ui::header(&format!("Workflows in {}", path.display()));
    for summary in &summaries {
        println!(
            "  {} {:<30} {}",
            "✓".green(),
            summary.workflow,
            summary.job_name.dimmed()
        );
        if !ctx.quiet {
            ui::dim(&format!(
                "{}: {}",
                ui::count(summary.task_types.len(), "task"),
                summary.task_types.join(", ")
            ));
            if ctx.verbose > 0 {
                ui::dim(&format!("schedule: {}", summary.schedule));
            }
        }
    }

    println!();
    ui::success(&format!("{} valid", ui::count(summaries.len(), "workflow")));
    Ok(())
}

/// Load and render `path`, describing each workflow
fn summarize(path: &Path, defaults: &PayloadDefaults) -> Result<Vec<WorkflowSummary>> {
    let raw = workflow::load(path)?;
    let definitions: BTreeMap<String, WorkflowDefinition> = workflow::workflows(&raw)?;
    let rendered = workflow::render_workflows(&definitions, defaults)
        .with_context(|| format!("Invalid workflow definitions in {}", path.display()))?;

    Ok(definitions
        .iter()
        .filter_map(|(name, definition)| {
            let job = rendered.get(name)?;
            Some(WorkflowSummary {
                workflow: name.clone(),
                job_name: job.name.clone(),
                task_types: definition
                    .tasks()
                    .iter()
                    .filter_map(|task| task.tasktype.clone())
                    .collect(),
                schedule: job.schedule.quartz_cron_expression.clone(),
            })
        })
        .collect())
}
