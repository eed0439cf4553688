//! Plan preview (`jobsync diff`)

use anyhow::{Context as _, Result};
use colored::Colorize;
use reconcile::{LiveInventory, ReconcilePlan, RenderedJob};
use similar::{ChangeTag, TextDiff};

use crate::Context;
use crate::cli::FileArgs;
use crate::ui;
use crate::workflow;

pub fn run(ctx: &Context, args: &FileArgs) -> Result<()> {
    let settings = ctx.settings()?;
    let path = settings.workflow_path(args.file.as_deref());
    let desired = workflow::load_desired(&path, &settings.defaults)?;

    let snapshots = ctx.snapshots(&settings)?;
    let last = snapshots
        .load_current()
        .context("Could not read the current state snapshot")?
        .into_config();
    let client = ctx.client(&settings)?;
    let live = LiveInventory::fetch(&client);

    let plan = reconcile::plan(&desired, &last, &live);
    print_plan(&plan);

    for update in plan.changed() {
        let (Some(old), Some(new)) = (last.get(&update.workflow), desired.get(&update.workflow))
        else {
            continue;
        };
        println!();
        println!("  {} {}", "───".yellow(), update.workflow.bold());
        show_job_diff(&old.job, new)?;
    }

    Ok(())
}

/// Print what a run would do
pub fn print_plan(plan: &ReconcilePlan) {
    if !plan.has_changes() {
        println!();
        println!(
            "  {} No changes needed ({} unchanged)",
            "✓".green(),
            ui::count(plan.unchanged.len(), "workflow")
        );
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Workflow Plan".bold()
    );
    println!("│");

    let changed: Vec<_> = plan.changed().collect();
    if !changed.is_empty() {
        println!("│ {}", "Update".bold());
        for update in changed {
            println!(
                "│   {} {:<30} {}",
                "~".yellow(),
                update.workflow,
                format!("job {}", ui::job_id(update.job_id)).dimmed()
            );
        }
        println!("│");
    }

    if !plan.removals.is_empty() {
        println!("│ {}", "Delete".bold());
        for removal in &plan.removals {
            println!(
                "│   {} {:<30} {}",
                "-".red(),
                removal.workflow,
                format!("{} (job {})", removal.job_name, ui::job_id(removal.job_id)).dimmed()
            );
        }
        println!("│");
    }

    if !plan.creates.is_empty() {
        println!("│ {}", "Create".bold());
        for name in &plan.creates {
            println!("│   {} {}", "+".green(), name);
        }
        println!("│");
    }

    if plan.removes_everything() {
        println!(
            "│ {} {}",
            "⚠".red().bold(),
            "No workflows are desired: every recorded job will be deleted"
                .red()
                .bold()
        );
        println!("│");
    }

    if !plan.inventory_available {
        println!(
            "│ {} {}",
            "⚠".yellow(),
            "Remote job list unavailable; creation will be skipped".yellow()
        );
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} unchanged)",
        plan.change_count().to_string().bold(),
        plan.unchanged.len()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Changed lines between the pretty JSON of two jobs
fn job_diff(old: &RenderedJob, new: &RenderedJob) -> Result<Vec<(ChangeTag, String)>> {
    let old = serde_json::to_string_pretty(old)?;
    let new = serde_json::to_string_pretty(new)?;

    let diff = TextDiff::from_lines(&old, &new);
    Ok(diff
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end().to_string()))
        .collect())
}

fn show_job_diff(old: &RenderedJob, new: &RenderedJob) -> Result<()> {
    let lines = job_diff(old, new)?;
    if lines.is_empty() {
        println!("    {}", "(payloads are identical)".dimmed());
    }
    for (tag, line) in lines {
        match tag {
            ChangeTag::Delete => println!("    {}", format!("- {line}").red()),
            ChangeTag::Insert => println!("    {}", format!("+ {line}").green()),
            ChangeTag::Equal => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadDefaults;
    use crate::workflow::{WorkflowDefinition, render_workflows};
    use reconcile::{SnapshotConfig, SnapshotEntry};
    use std::collections::BTreeMap;

    fn as_config(desired: &BTreeMap<String, RenderedJob>) -> SnapshotConfig {
        desired
            .iter()
            .map(|(name, job)| (name.clone(), SnapshotEntry::new(job.clone(), None)))
            .collect()
    }

    fn rendered(max_runs: u32) -> BTreeMap<String, RenderedJob> {
        let yaml = format!(
            "job_name: alpha\nmax_concurrent_runs: {max_runs}\ntasks:\n  - task_name: t\n    tasktype: NOTEBOOK\n    filepath: nb\n"
        );
        let definition: WorkflowDefinition = serde_yaml::from_str(&yaml).unwrap();
        let definitions = BTreeMap::from([("workflow_a".to_string(), definition)]);
        render_workflows(&definitions, &PayloadDefaults::default()).unwrap()
    }

    #[test]
    fn test_job_diff_shows_changed_field() {
        let old = rendered(1);
        let new = rendered(4);

        let lines = job_diff(&old["workflow_a"], &new["workflow_a"]).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, ChangeTag::Delete);
        assert!(lines[0].1.contains("\"max_concurrent_runs\": 1"));
        assert_eq!(lines[1].0, ChangeTag::Insert);
        assert!(lines[1].1.contains("\"max_concurrent_runs\": 4"));
    }

    #[test]
    fn test_job_diff_identical() {
        let job = rendered(1);
        assert!(job_diff(&job["workflow_a"], &job["workflow_a"]).unwrap().is_empty());
    }

    #[test]
    fn test_plan_from_rendered_config() {
        let desired = rendered(2);
        let last = as_config(&rendered(1));
        let live = LiveInventory::available(["alpha".to_string()]);

        let plan = reconcile::plan(&desired, &last, &live);
        assert_eq!(plan.changed().count(), 1);
        assert!(plan.creates.is_empty());
        assert!(plan.removals.is_empty());
    }
}
