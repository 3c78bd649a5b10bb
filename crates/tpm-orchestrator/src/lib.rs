//! Drives an [`tpm_depres::InstallationGraph`] to completion against a
//! target filesystem and package database (spec §4.6): classifies the
//! difference into operations, orders them against the dependency graph
//! and file-path conflicts, and runs each through the low-level state
//! machine in [`steps`].

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod plan;
mod scc;
mod scripts;
mod steps;
mod triggers;

pub use plan::{Operation, OperationKind, classify_operations, mark_file_conflicts};
pub use scc::{EdgeKind, PackageKey, topological_order};
pub use steps::Context;

use tpm_core::{AHashMap, Architecture, PackageMetaData, Result};
use tpm_depres::InstallationGraph;
use tracing::info;

/// What actually happened during a [`run`] call, for the CLI to report.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub installed: Vec<(String, Architecture)>,
    pub upgraded: Vec<(String, Architecture)>,
    pub removed: Vec<(String, Architecture)>,
}

/// Drives `graph` to completion. `installed` is the caller's current
/// snapshot of installed packages (e.g. every row in `wanted`/`configured`).
pub fn run(ctx: &mut Context, graph: &InstallationGraph, installed: &[PackageMetaData]) -> Result<RunReport> {
    let mut operations = classify_operations(graph, installed);
    annotate_file_conflicts(&*ctx, &mut operations)?;

    let order = topological_order(graph, EdgeKind::Dependencies);
    let position: AHashMap<PackageKey, usize> =
        order.into_iter().flatten().enumerate().map(|(i, k)| (k, i)).collect();
    let reasons: AHashMap<PackageKey, tpm_core::InstallationReason> = graph
        .nodes
        .iter()
        .map(|n| {
            let reason = if n.is_selected {
                tpm_core::InstallationReason::Manual
            } else {
                tpm_core::InstallationReason::Auto
            };
            ((n.name.clone(), n.arch), reason)
        })
        .collect();

    let mut report = RunReport::default();

    let mut plain_removals: Vec<&Operation> = operations
        .iter()
        .filter(|o| matches!(o.kind, OperationKind::Remove | OperationKind::ReplaceRemove))
        .collect();
    plain_removals.sort_by_key(|o| std::cmp::Reverse(position.get(&(o.name.clone(), o.arch)).copied().unwrap_or(0)));

    for op in plain_removals {
        let version = op
            .old_version
            .as_ref()
            .ok_or_else(|| tpm_core::Error::DbIntegrity(format!("{}/{} removal has no recorded version", op.name, op.arch)))?;
        run_plain_removal(ctx, &op.name, op.arch, version)?;
        report.removed.push((op.name.clone(), op.arch));
    }

    let mut installs: Vec<&Operation> = operations.iter().filter(|o| o.kind.is_install()).collect();
    installs.sort_by_key(|o| position.get(&(o.name.clone(), o.arch)).copied().unwrap_or(usize::MAX));

    for op in installs {
        let new_version = op
            .new_version
            .as_ref()
            .ok_or_else(|| tpm_core::Error::DbIntegrity(format!("{}/{} install has no target version", op.name, op.arch)))?;

        match op.kind {
            OperationKind::ChangeInstall => {
                let removal = operations
                    .iter()
                    .find(|o| o.kind == OperationKind::ChangeRemove && o.name == op.name && o.arch == op.arch)
                    .ok_or_else(|| tpm_core::Error::DbIntegrity(format!("{}/{} change has no paired removal", op.name, op.arch)))?;
                let old_version = removal.old_version.clone().ok_or_else(|| {
                    tpm_core::Error::DbIntegrity(format!("{}/{} change removal has no recorded version", op.name, op.arch))
                })?;
                let reason = reasons
                    .get(&(op.name.clone(), op.arch))
                    .copied()
                    .unwrap_or(tpm_core::InstallationReason::Manual);
                run_change(ctx, &op.name, op.arch, &old_version, new_version, reason)?;
                report.upgraded.push((op.name.clone(), op.arch));
            }
            OperationKind::ChangeRemove => {}
            _ => {
                let reason = reasons
                    .get(&(op.name.clone(), op.arch))
                    .copied()
                    .unwrap_or(tpm_core::InstallationReason::Manual);
                run_plain_install(ctx, &op.name, op.arch, new_version, reason)?;
                report.installed.push((op.name.clone(), op.arch));
            }
        }
    }

    triggers::execute_triggers(ctx.db, ctx.target)?;
    info!(
        installed = report.installed.len(),
        upgraded = report.upgraded.len(),
        removed = report.removed.len(),
        "run complete"
    );
    Ok(report)
}

fn run_plain_install(
    ctx: &mut Context,
    name: &str,
    arch: Architecture,
    version: &tpm_core::VersionNumber,
    reason: tpm_core::InstallationReason,
) -> Result<()> {
    steps::ll_run_preinst(ctx, name, arch, version, reason, false)?;
    steps::ll_unpack(ctx, name, arch, version, false)?;
    steps::ll_configure_package(ctx, name, arch, version, false)
}

fn run_plain_removal(ctx: &mut Context, name: &str, arch: Architecture, version: &tpm_core::VersionNumber) -> Result<()> {
    steps::ll_unconfigure(ctx, name, arch, version, false)?;
    steps::ll_rm_files(ctx, name, arch, version, false, None)?;
    steps::ll_run_postrm(ctx, name, arch, version, false)
}

/// An in-place upgrade: both versions carry their own row through the
/// `*_change` arc, rendezvousing at `wait_old_removed`/`wait_new_unpacked`.
fn run_change(
    ctx: &mut Context,
    name: &str,
    arch: Architecture,
    old_version: &tpm_core::VersionNumber,
    new_version: &tpm_core::VersionNumber,
    reason: tpm_core::InstallationReason,
) -> Result<()> {
    steps::ll_run_preinst(ctx, name, arch, new_version, reason, true)?;
    steps::ll_unpack(ctx, name, arch, new_version, true)?;
    steps::ll_unconfigure(ctx, name, arch, old_version, true)?;
    steps::ll_rm_files(ctx, name, arch, old_version, true, Some(new_version))?;
    steps::ll_run_postrm(ctx, name, arch, old_version, true)?;
    steps::ll_configure_package(ctx, name, arch, new_version, true)
}

fn annotate_file_conflicts(ctx: &Context, operations: &mut Vec<Operation>) -> Result<()> {
    let mut files_by_install: AHashMap<(String, Architecture), Vec<String>> = AHashMap::new();
    let mut files_by_remove: AHashMap<(String, Architecture), Vec<String>> = AHashMap::new();

    for op in operations.iter() {
        match op.kind {
            OperationKind::InstallNew | OperationKind::ChangeInstall => {
                if let Some(v) = &op.new_version {
                    if let Some(pkg) = ctx.provider.get_package(&op.name, op.arch, v)? {
                        let files = pkg.file_list()?.into_iter().map(|f| f.path).collect();
                        files_by_install.insert((op.name.clone(), op.arch), files);
                    }
                }
            }
            OperationKind::Remove | OperationKind::ChangeRemove => {
                if let Some(v) = &op.old_version {
                    if let Some(md) = ctx.db.get_reduced_package(&op.name, op.arch, v)? {
                        let files = ctx.db.get_files(&md)?.into_iter().map(|f| f.path).collect();
                        files_by_remove.insert((op.name.clone(), op.arch), files);
                    }
                }
            }
            OperationKind::ReplaceInstall | OperationKind::ReplaceRemove => {}
        }
    }

    mark_file_conflicts(operations, &files_by_install, &files_by_remove);
    Ok(())
}
