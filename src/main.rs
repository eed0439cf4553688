mod cli;
mod commands;
mod config;
mod paths;
mod ui;
mod workflow;

use anyhow::{Context as _, Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, GlobalArgs, StateCommand};
use config::Settings;
use jobsapi::Client;
use reconcile::SnapshotStore;
use statestore::FsStore;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub global: GlobalArgs,
}

impl Context {
    /// Settings from the file, with command-line overrides applied
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.global.config.as_deref())?;
        if let Some(url) = &self.global.api_url {
            settings.api.base_url.clone_from(url);
        }
        if let Some(root) = &self.global.state_root {
            settings.state.root = Some(root.clone());
        }
        if let Some(bucket) = &self.global.bucket {
            settings.state.bucket.clone_from(bucket);
        }
        Ok(settings)
    }

    pub fn client(&self, settings: &Settings) -> Result<Client> {
        let Some(token) = self.global.token.as_deref().filter(|t| !t.is_empty()) else {
            bail!("No API token: set SERVICE_PRINCIPAL_TOKEN or pass --token");
        };
        log::debug!("Using job API at {}", settings.api.base_url);
        Ok(Client::new(&settings.api.client_config(token)))
    }

    pub fn snapshots(&self, settings: &Settings) -> Result<SnapshotStore> {
        let root = settings
            .state
            .root_path()
            .context("Could not resolve the state store root")?;
        log::debug!("Using state store at {}", root.display());
        Ok(SnapshotStore::new(
            Box::new(FsStore::new(&root)),
            settings.state.location(),
        ))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        global: cli.global,
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Diff(args) => commands::diff::run(&ctx, &args),
        Command::State(cmd) => match cmd {
            StateCommand::Show { version } => commands::state::show(&ctx, version.as_deref()),
            StateCommand::History => commands::state::history(&ctx),
        },
        Command::Validate(args) => commands::validate::run(&ctx, &args),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "jobsync", &mut io::stdout());
            Ok(())
        }
    }
}
