//! Snapshot inspection (`jobsync state`)

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use reconcile::{SnapshotRead, SnapshotStore, StateSnapshot, Version};

use crate::Context;
use crate::ui;

/// Show the current snapshot, or the historic one for `version`
pub fn show(ctx: &Context, version: Option<&str>) -> Result<()> {
    let settings = ctx.settings()?;
    let snapshots = ctx.snapshots(&settings)?;

    let snapshot = match version {
        Some(label) => {
            let version: Version = label
                .parse()
                .with_context(|| format!("Invalid version '{label}'"))?;
            match snapshots.load_historic(&version)? {
                Some(snapshot) => snapshot,
                None => bail!("No historic snapshot for version {version}"),
            }
        }
        None => match snapshots.load_current()? {
            SnapshotRead::Found(snapshot) => snapshot,
            SnapshotRead::Absent => {
                ui::info("No state recorded yet");
                return Ok(());
            }
        },
    };

    print_snapshot(&snapshot);
    Ok(())
}

fn print_snapshot(snapshot: &StateSnapshot) {
    ui::header(&format!("State {}", snapshot.metadata.version));
    ui::kv("Committed", &snapshot.metadata.timestamp);
    ui::kv("Workflows", &snapshot.config.len().to_string());

    if snapshot.config.is_empty() {
        return;
    }

    ui::section("Jobs");
    for (workflow, entry) in &snapshot.config {
        let id = ui::job_id(entry.job_id);
        let id = if entry.job_id.is_some() {
            id.normal()
        } else {
            id.yellow()
        };
        println!(
            "  {:<30} {:<30} {} {}",
            workflow,
            entry.job.name.dimmed(),
            "job".dimmed(),
            id
        );
    }
}

/// One line of `jobsync state history`
#[derive(Debug, Clone, PartialEq, Eq)]
struct HistoryRow {
    version: Version,
    is_current: bool,
    is_previous: bool,
}

fn history_rows(snapshots: &SnapshotStore) -> Result<Vec<HistoryRow>> {
    let versions = snapshots.historic_versions()?;
    let current = snapshots.current_version()?;
    let previous = snapshots.previous_version()?;

    Ok(versions
        .into_iter()
        .rev()
        .map(|version| HistoryRow {
            version,
            is_current: current == Some(version),
            is_previous: previous == Some(version),
        })
        .collect())
}

/// List historic versions, newest first
pub fn history(ctx: &Context) -> Result<()> {
    let settings = ctx.settings()?;
    let snapshots = ctx.snapshots(&settings)?;
    let rows = history_rows(&snapshots)?;

    if rows.is_empty() {
        ui::info("No historic snapshots");
        return Ok(());
    }

    ui::header("State history");
    for row in &rows {
        let marker = if row.is_current {
            "(current)".green().to_string()
        } else if row.is_previous {
            "(previous)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("  {:<8} {marker}", row.version.to_string());
    }
    println!();
    ui::dim(&ui::count(rows.len(), "version"));
    Ok(())
}
