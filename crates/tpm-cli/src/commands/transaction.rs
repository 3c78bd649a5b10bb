//! `--install`, `--upgrade`, `--remove`, `--remove-unneeded`: the four
//! operations that actually drive the orchestrator (spec §4.6).

use tpm_core::{Architecture, Formula, Result};
use tpm_depres::{SelectedPackage, SolverConfig};
use tpm_filetrie::Trie;
use tpm_orchestrator::Context;

use super::Session;
use super::helpers::{installed_packages, parse_package_arg};
use crate::output::{self, prompt::Confirm};

fn selections_for(names: &[String], already_selected: &[SelectedPackage]) -> Result<Vec<SelectedPackage>> {
    let mut out = Vec::new();
    for arg in names {
        let (name, arch) = parse_package_arg(arg)?;
        out.push(SelectedPackage { name, arch, formula: Formula::always_true() });
    }
    out.extend(already_selected.iter().cloned());
    Ok(out)
}

/// Every currently `Manual` package, used as the selection set when the
/// user names none (`--upgrade` with no arguments, `--remove-unneeded`).
fn every_manual_selection(session: &Session) -> Result<Vec<SelectedPackage>> {
    Ok(installed_packages(&session.db)?
        .into_iter()
        .filter(|p| !p.installed_automatically)
        .map(|p| SelectedPackage { name: p.name, arch: p.arch, formula: Formula::always_true() })
        .collect())
}

fn confirm_or_assume(message: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Confirm::new(message)
        .default(false)
        .prompt()
        .map_err(|source| tpm_core::Error::Io { path: "<stdin>".into(), source })
}

fn run_graph(session: &mut Session, selected: Vec<SelectedPackage>, assume_yes: bool, adopt_all: bool) -> Result<()> {
    let installed = installed_packages(&session.db)?;
    let graph = tpm_depres::solve(&session.provider, &installed, &selected, SolverConfig { evaluate_all: true, ..Default::default() })?;

    if graph.nodes.is_empty() {
        output::info("nothing to do");
        return Ok(());
    }

    output::info(&format!("planned changes ({} packages):", graph.nodes.len()));
    for node in &graph.nodes {
        let version = node.chosen_version.as_ref().map(ToString::to_string);
        output::package(&format!("{}/{}", node.name, node.arch), version.as_deref());
    }

    if !confirm_or_assume("Proceed?", assume_yes)? {
        return Err(tpm_core::Error::UserAbort);
    }

    let installed_rows = session.db.get_packages_in_state(None)?;
    let mut ctx = Context {
        db: &mut session.db,
        provider: &session.provider,
        target: &session.target,
        file_owners: Trie::new(),
        adopt_all,
    };
    let report = tpm_orchestrator::run(&mut ctx, &graph, &installed_rows)?;

    for (name, arch) in &report.installed {
        output::success(&format!("installed {name}/{arch}"));
    }
    for (name, arch) in &report.upgraded {
        output::success(&format!("upgraded {name}/{arch}"));
    }
    for (name, arch) in &report.removed {
        output::success(&format!("removed {name}/{arch}"));
    }
    Ok(())
}

pub fn run_install(session: &mut Session, names: &[String], assume_yes: bool, adopt_all: bool) -> Result<()> {
    let selected = selections_for(names, &every_manual_selection(session)?)?;
    run_graph(session, selected, assume_yes, adopt_all)
}

pub fn run_upgrade(session: &mut Session, names: &[String], assume_yes: bool, adopt_all: bool) -> Result<()> {
    let selected = if names.is_empty() {
        every_manual_selection(session)?
    } else {
        selections_for(names, &[])?
    };
    run_graph(session, selected, assume_yes, adopt_all)
}

/// A plain removal: every named package is dropped from the selection set
/// and demoted to auto so the solver is free to garbage-collect it, keeping
/// the rest of the manually-selected system exactly as chosen.
pub fn run_remove(session: &mut Session, names: &[String], assume_yes: bool, adopt_all: bool) -> Result<()> {
    let mut targets = Vec::with_capacity(names.len());
    for arg in names {
        targets.push(parse_package_arg(arg)?);
    }

    let selected: Vec<SelectedPackage> = every_manual_selection(session)?
        .into_iter()
        .filter(|p| !targets.iter().any(|(name, arch): &(String, Architecture)| *name == p.name && *arch == p.arch))
        .collect();

    run_graph(session, selected, assume_yes, adopt_all)
}

pub fn run_remove_unneeded(session: &mut Session, assume_yes: bool, adopt_all: bool) -> Result<()> {
    let selected = every_manual_selection(session)?;
    run_graph(session, selected, assume_yes, adopt_all)
}
