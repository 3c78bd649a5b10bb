//! `--installation-graph` / `--removal-graph`: print the graph a real
//! operation would act on, without touching the database or filesystem.

use tpm_core::{Formula, Result};
use tpm_depres::{SelectedPackage, SolverConfig};

use super::Session;
use super::helpers::{installed_packages, parse_package_arg};
use crate::output;

fn print_graph(session: &Session, selected: Vec<SelectedPackage>) -> Result<()> {
    let installed = installed_packages(&session.db)?;
    let graph = tpm_depres::solve(&session.provider, &installed, &selected, SolverConfig { evaluate_all: true, ..Default::default() })?;

    if graph.nodes.is_empty() {
        output::info("empty graph");
        return Ok(());
    }
    for node in &graph.nodes {
        let version = node.chosen_version.as_ref().map_or_else(|| "removed".to_string(), ToString::to_string);
        let reason = if node.is_selected { "manual" } else { "auto" };
        output::package(&format!("{}/{} [{reason}]", node.name, node.arch), Some(&version));
        for (name, arch) in &node.dependencies {
            println!("    depends on {name}/{arch}");
        }
    }
    Ok(())
}

pub fn run_installation_graph(session: &Session, names: &[String]) -> Result<()> {
    let mut selected = Vec::with_capacity(names.len());
    for arg in names {
        let (name, arch) = parse_package_arg(arg)?;
        selected.push(SelectedPackage { name, arch, formula: Formula::always_true() });
    }
    print_graph(session, selected)
}

pub fn run_removal_graph(session: &Session, names: &[String]) -> Result<()> {
    let targets: Result<Vec<_>> = names.iter().map(|a| parse_package_arg(a)).collect();
    let targets = targets?;
    let selected = installed_packages(&session.db)?
        .into_iter()
        .filter(|p| !p.installed_automatically)
        .filter(|p| !targets.iter().any(|(n, a)| *n == p.name && *a == p.arch))
        .map(|p| SelectedPackage { name: p.name, arch: p.arch, formula: Formula::always_true() })
        .collect();
    print_graph(session, selected)
}
