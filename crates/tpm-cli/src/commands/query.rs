//! Read-only reporting operations: `--list-installed`, `--list-available`,
//! `--show-version`, `--show-problems`, `--reverse-dependencies`,
//! `--compare-system`.

use tpm_core::{Architecture, Formula, PackageState, Result};
use tpm_depres::{SelectedPackage, SolverConfig};

use super::Session;
use super::helpers::{find_installed, installed_packages, parse_package_arg};
use crate::output::{self, table::quick_table};

pub fn run_list_installed(session: &Session) -> Result<()> {
    let packages = session.db.get_packages_in_state(Some(PackageState::Configured))?;
    let rows: Vec<[String; 3]> = packages
        .iter()
        .map(|md| [md.name.clone(), md.arch.to_string(), md.version.to_string()])
        .collect();
    if rows.is_empty() {
        output::info("no packages installed");
        return Ok(());
    }
    quick_table(["Name", "Arch", "Version"], rows).print();
    Ok(())
}

pub fn run_list_available(session: &Session, names: &[String]) -> Result<()> {
    let targets: Vec<(String, Architecture)> = if names.is_empty() {
        session
            .db
            .get_packages_in_state(None)?
            .into_iter()
            .map(|md| (md.name, md.arch))
            .collect()
    } else {
        let mut out = Vec::with_capacity(names.len());
        for arg in names {
            out.push(parse_package_arg(arg)?);
        }
        out
    };

    let mut rows = Vec::new();
    for (name, arch) in targets {
        let mut versions: Vec<_> = session.provider.list_package_versions(&name, arch)?.into_iter().collect();
        versions.sort();
        for version in versions {
            rows.push([name.clone(), arch.to_string(), version.to_string()]);
        }
    }
    if rows.is_empty() {
        output::info("no packages available");
        return Ok(());
    }
    quick_table(["Name", "Arch", "Version"], rows).print();
    Ok(())
}

pub fn run_show_version(session: &Session, name: &str) -> Result<()> {
    let md = find_installed(&session.db, name)?;
    println!("{}", md.version);
    Ok(())
}

/// Re-solves against the current selection and reports every primitive
/// dependency constraint that the currently installed version fails.
pub fn run_show_problems(session: &Session) -> Result<()> {
    let installed = installed_packages(&session.db)?;
    let mut found = false;
    for pkg in &installed {
        let Some(provided) = session.provider.get_package(&pkg.name, pkg.arch, &pkg.version)? else {
            output::warning(&format!("{}/{} {} is installed but no longer offered by any repository", pkg.name, pkg.arch, pkg.version));
            found = true;
            continue;
        };
        let descriptor = provided.mdata()?;
        for dep in descriptor.dependencies.iter().chain(&descriptor.pre_dependencies) {
            let satisfied = installed.iter().any(|other| {
                other.name == dep.name && other.arch == dep.arch && dep.constraint.satisfies(&other.version, &other.version)
            });
            if !satisfied {
                output::warning(&format!(
                    "{}/{} {} requires {}/{} {}, which is not installed",
                    pkg.name, pkg.arch, pkg.version, dep.name, dep.arch, dep.constraint
                ));
                found = true;
            }
        }
    }
    if !found {
        output::success("no problems found");
    }
    Ok(())
}

pub fn run_reverse_dependencies(session: &Session, name: &str) -> Result<()> {
    let (target_name, target_arch) = parse_package_arg(name)?;
    let installed = installed_packages(&session.db)?;
    let mut rows = Vec::new();
    for pkg in &installed {
        let Some(provided) = session.provider.get_package(&pkg.name, pkg.arch, &pkg.version)? else {
            continue;
        };
        let descriptor = provided.mdata()?;
        let depends = descriptor
            .dependencies
            .iter()
            .chain(&descriptor.pre_dependencies)
            .any(|d| d.name == target_name && d.arch == target_arch);
        if depends {
            rows.push([pkg.name.clone(), pkg.arch.to_string(), pkg.version.to_string()]);
        }
    }
    if rows.is_empty() {
        output::info(&format!("nothing depends on {target_name}/{target_arch}"));
        return Ok(());
    }
    quick_table(["Name", "Arch", "Version"], rows).print();
    Ok(())
}

/// Solves from scratch against every manually-installed package and
/// reports where the result would diverge from what's on disk.
pub fn run_compare_system(session: &Session) -> Result<()> {
    let installed = installed_packages(&session.db)?;
    let selected: Vec<SelectedPackage> = installed
        .iter()
        .filter(|p| !p.installed_automatically)
        .map(|p| SelectedPackage { name: p.name.clone(), arch: p.arch, formula: Formula::always_true() })
        .collect();

    let graph = tpm_depres::solve(&session.provider, &installed, &selected, SolverConfig { evaluate_all: true, ..Default::default() })?;

    let mut differs = false;
    for node in &graph.nodes {
        let current = installed.iter().find(|p| p.name == node.name && p.arch == node.arch);
        match (current, &node.chosen_version) {
            (Some(cur), Some(chosen)) if cur.version != *chosen => {
                output::warning(&format!("{}/{}: installed {} but solve chose {chosen}", node.name, node.arch, cur.version));
                differs = true;
            }
            (None, Some(chosen)) => {
                output::warning(&format!("{}/{}: solve would install {chosen}, currently absent", node.name, node.arch));
                differs = true;
            }
            _ => {}
        }
    }
    for pkg in &installed {
        if !graph.nodes.iter().any(|n| n.name == pkg.name && n.arch == pkg.arch) {
            output::warning(&format!("{}/{}: installed but solve would remove it", pkg.name, pkg.arch));
            differs = true;
        }
    }

    if !differs {
        output::success("installed system matches a fresh solve");
    }
    Ok(())
}
