use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jobsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile declarative workflow definitions against a remote job API", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the settings file
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Settings file (defaults to config.toml in the config dir)
    #[arg(long, env = "JOBSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the job API
    #[arg(long, env = "JOBSYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Root directory of the state store
    #[arg(long, env = "JOBSYNC_STATE_ROOT", global = true)]
    pub state_root: Option<String>,

    /// State bucket name
    #[arg(long, env = "JOBSYNC_BUCKET", global = true)]
    pub bucket: Option<String>,

    /// Bearer token for the job API
    #[arg(long, env = "SERVICE_PRINCIPAL_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create, update and delete remote jobs to match the workflow file
    Apply(ApplyArgs),

    /// Show what apply would change
    Diff(FileArgs),

    /// Inspect recorded state snapshots
    #[command(subcommand)]
    State(StateCommand),

    /// Load and render the workflow file without touching remote state
    Validate(FileArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Command arguments
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct FileArgs {
    /// Workflow YAML file (defaults to workflow/job_config.yaml)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub file: FileArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show the plan and stop
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StateCommand {
    /// Show the current snapshot, or a historic one
    Show {
        /// Historic version to show (e.g. 1.3)
        #[arg(id = "snapshot_version", value_name = "VERSION")]
        version: Option<String>,
    },

    /// List historic versions
    History,
}
