//! Reconciliation (`jobsync apply`)

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use jobsapi::Client;
use reconcile::{
    LiveInventory, PhaseOutcome, ReconcilePlan, ReconcileReport, Reconciler, RenderedJob,
    SnapshotConfig, SnapshotStore,
};
use std::collections::BTreeMap;

use super::diff::print_plan;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::ui;
use crate::workflow;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let settings = ctx.settings()?;
    let path = settings.workflow_path(args.file.file.as_deref());
    let desired = workflow::load_desired(&path, &settings.defaults)?;
    log::info!("Loaded {} workflows from {}", desired.len(), path.display());

    let snapshots = ctx.snapshots(&settings)?;
    let client = ctx.client(&settings)?;
    let inputs = RunInputs::gather(&client, &snapshots, desired)?;

    let plan = inputs.plan();
    if !ctx.quiet {
        print_plan(&plan);
    }

    if !plan.has_changes() && plan.inventory_available {
        return Ok(());
    }

    if plan.removes_everything() {
        println!();
        ui::warn(&format!(
            "No workflows loaded from {}; applying will delete {}",
            path.display(),
            ui::count(plan.removals.len(), "recorded job")
        ));
    }

    if args.dry_run {
        println!();
        ui::dim("Dry run complete. Run without --dry-run to apply.");
        return Ok(());
    }

    if !args.yes && !confirm_proceed()? {
        ui::info("Aborted");
        return Ok(());
    }

    let report = inputs.reconcile(&client, &snapshots)?;
    print_summary(&report);

    if !report.is_success() {
        bail!("One or more phases failed; re-run apply to retry");
    }
    Ok(())
}

/// The three inputs of a run, read once and shared by plan and execution
struct RunInputs {
    desired: BTreeMap<String, RenderedJob>,
    last: SnapshotConfig,
    live: LiveInventory,
}

impl RunInputs {
    fn gather(
        client: &Client,
        snapshots: &SnapshotStore,
        desired: BTreeMap<String, RenderedJob>,
    ) -> Result<Self> {
        let last = snapshots
            .load_current()
            .context("Could not read the current state snapshot")?
            .into_config();
        log::info!("Last-applied state has {} workflows", last.len());

        let live = LiveInventory::fetch(client);
        Ok(Self {
            desired,
            last,
            live,
        })
    }

    fn plan(&self) -> ReconcilePlan {
        reconcile::plan(&self.desired, &self.last, &self.live)
    }

    fn reconcile(&self, client: &Client, snapshots: &SnapshotStore) -> Result<ReconcileReport> {
        Reconciler::new(client, snapshots)
            .reconcile(&self.desired, &self.last, &self.live)
            .context("Reconciliation aborted")
    }
}

fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn print_summary(report: &ReconcileReport) {
    println!();
    if report.is_success() {
        println!("  {} Workflows applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Workflows applied with errors", "⚠".yellow().bold());
    }

    for (phase, outcome) in report.phases() {
        let line = format!("{phase:<7} {outcome}");
        match outcome {
            PhaseOutcome::NoChanges => println!("    • {}", line.dimmed()),
            PhaseOutcome::Applied { .. } => println!("    • {line}"),
            _ => println!("    • {}", line.red()),
        }
    }

    if let Some(version) = report.final_version() {
        println!("    • state version {}", version.bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadDefaults;
    use jobsapi::{JobId, MockBackend};
    use reconcile::SnapshotLocation;
    use statestore::FsStore;
    use std::fs;
    use tempfile::TempDir;

    const WORKFLOWS: &str = r#"
workflow_ingest:
  job_name: ingest
  schedule: "0 0 6 * * ?"
  tasks:
    - task_name: extract
      tasktype: NOTEBOOK
      filepath: notebooks/extract
    - task_name: load
      tasktype: PYTHON
      filepath: jobs/load.py
      depends_on: extract
settings:
  ignored: true
"#;

    struct Setup {
        temp: TempDir,
        mock: MockBackend,
        client: Client,
        snapshots: SnapshotStore,
        desired: BTreeMap<String, RenderedJob>,
    }

    fn setup(yaml: &str) -> Setup {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("job_config.yaml");
        fs::write(&file, yaml).unwrap();

        let mock = MockBackend::new();
        Setup {
            desired: workflow::load_desired(&file, &PayloadDefaults::default()).unwrap(),
            client: Client::with_backend(Box::new(mock.clone())),
            snapshots: SnapshotStore::new(
                Box::new(FsStore::new(&temp.path().join("state"))),
                SnapshotLocation::default(),
            ),
            mock,
            temp,
        }
    }

    fn apply(s: &Setup) -> ReconcileReport {
        RunInputs::gather(&s.client, &s.snapshots, s.desired.clone())
            .unwrap()
            .reconcile(&s.client, &s.snapshots)
            .unwrap()
    }

    #[test]
    fn test_first_apply_creates_job_and_records_state() {
        let s = setup(WORKFLOWS);
        assert_eq!(s.desired.len(), 1);

        let report = apply(&s);
        assert_eq!(report.final_version(), Some("1.0"));
        assert_eq!(s.mock.job_names(), vec!["ingest"]);

        let state = s.snapshots.load_current().unwrap().into_config();
        assert_eq!(state["workflow_ingest"].job_id, Some(JobId(1)));
        assert_eq!(state["workflow_ingest"].job.tasks.len(), 2);
        assert!(
            s.temp
                .path()
                .join("state/databricks-workflow/current_state.json")
                .exists()
        );
    }

    #[test]
    fn test_second_apply_is_a_no_op() {
        let s = setup(WORKFLOWS);
        apply(&s);
        s.mock.clear_calls();

        let inputs = RunInputs::gather(&s.client, &s.snapshots, s.desired.clone()).unwrap();
        assert!(!inputs.plan().has_changes());

        let report = inputs.reconcile(&s.client, &s.snapshots).unwrap();
        assert!(report.is_success());
        assert_eq!(s.mock.mutation_count(), 0);
        assert_eq!(report.final_version(), None);
    }

    #[test]
    fn test_plan_lists_new_workflow_as_create() {
        let s = setup(WORKFLOWS);
        let plan = RunInputs::gather(&s.client, &s.snapshots, s.desired.clone())
            .unwrap()
            .plan();

        assert_eq!(plan.creates, vec!["workflow_ingest"]);
        assert!(plan.removals.is_empty());
        assert!(plan.inventory_available);
    }

    #[test]
    fn test_malformed_file_plans_removal_of_everything() {
        let s = setup(WORKFLOWS);
        apply(&s);

        let file = s.temp.path().join("broken.yaml");
        fs::write(&file, "workflow_ingest: [unclosed\n").unwrap();
        let desired = workflow::load_desired(&file, &PayloadDefaults::default()).unwrap();
        assert!(desired.is_empty());

        let plan = RunInputs::gather(&s.client, &s.snapshots, desired)
            .unwrap()
            .plan();
        assert!(plan.removes_everything());
        assert_eq!(plan.removals.len(), 1);
    }

    #[test]
    fn test_unreadable_state_aborts_before_remote_calls() {
        let s = setup(WORKFLOWS);
        let state = s.temp.path().join("state/databricks-workflow");
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("current_state.json"), "{ not json").unwrap();

        assert!(RunInputs::gather(&s.client, &s.snapshots, s.desired.clone()).is_err());
        assert!(s.mock.calls().is_empty());
    }
}
