//! Command-line dispatcher for the tpm2 package manager: dependency
//! resolution, install/removal orchestration, and the transactional package
//! database, all driven off a flat, mutually-exclusive set of operation
//! flags (spec §6).

mod commands;
mod config;
mod output;

use std::process::ExitCode;

use clap::Parser;
use commands::{Cli, Session};
use tpm_core::{Error, Result};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with_target(false)
        .without_time()
        .init();

    output::init(None, false);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let target = cli.resolve_target();

    if !cli.create_index.is_empty() {
        let dir = std::path::Path::new(&cli.create_index[0]);
        let name = cli.create_index.get(1).map(String::as_str);
        return commands::create_index(dir, name, cli.sign.as_deref());
    }

    let mut session = Session::open(&target)?;

    if !cli.install.is_empty() {
        return commands::run_install(&mut session, &cli.install, cli.assume_yes, cli.adopt_all);
    }
    if let Some(names) = &cli.upgrade {
        return commands::run_upgrade(&mut session, names, cli.assume_yes, cli.adopt_all);
    }
    if !cli.remove.is_empty() {
        return commands::run_remove(&mut session, &cli.remove, cli.assume_yes, cli.adopt_all);
    }
    if cli.remove_unneeded {
        return commands::run_remove_unneeded(&mut session, cli.assume_yes, cli.adopt_all);
    }
    if !cli.removal_graph.is_empty() {
        return commands::run_removal_graph(&session, &cli.removal_graph);
    }
    if !cli.installation_graph.is_empty() {
        return commands::run_installation_graph(&session, &cli.installation_graph);
    }
    if cli.list_installed {
        return commands::run_list_installed(&session);
    }
    if cli.list_available {
        return commands::run_list_available(&session, &[]);
    }
    if let Some(name) = &cli.show_version {
        return commands::run_show_version(&session, name);
    }
    if cli.show_problems {
        return commands::run_show_problems(&session);
    }
    if let Some(name) = &cli.reverse_dependencies {
        return commands::run_reverse_dependencies(&session, name);
    }
    if !cli.mark_manual.is_empty() {
        return commands::run_mark_manual(&mut session, &cli.mark_manual);
    }
    if !cli.mark_auto.is_empty() {
        return commands::run_mark_auto(&mut session, &cli.mark_auto);
    }
    if cli.compare_system {
        return commands::run_compare_system(&session);
    }

    Err(Error::DbIntegrity("no operation selected".into()))
}
