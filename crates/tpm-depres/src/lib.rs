//! The score-guided iterative dependency resolver ("depres", spec §4.5).
//!
//! Given the currently installed packages and the set of packages the user
//! selected (installed, upgraded, or pinned), [`solve`] produces the full
//! set of packages that must end up installed, dependency edges included,
//! by iterating a work queue of installation-graph nodes to a fixed point.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod node;
mod policy;
mod scoring;
mod solver;
mod types;

pub use node::{ConstraintSource, IgNode, NodeId};
pub use policy::Policy;
pub use scoring::Score;
pub use solver::{Solver, SolverConfig, SolverStats};
pub use types::{InstallationGraph, InstalledPackage, ResolvedNode, SelectedPackage};

use tpm_core::Result;
use tpm_provider::Provider;

/// Convenience entry point: builds a [`Solver`] with `config` and resolves
/// it against `installed` and `selected` in one call.
pub fn solve(
    provider: &Provider,
    installed: &[InstalledPackage],
    selected: &[SelectedPackage],
    config: SolverConfig,
) -> Result<InstallationGraph> {
    Solver::new(provider, config).resolve(installed, selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_core::{Architecture, Constraint, ConstraintOp, ConstraintTarget, Formula};
    use tpm_provider::{DirectoryRepository, Provider};
    use tpm_transport::{SectionType, build_transport_file};

    fn write_package(dir: &std::path::Path, arch: &str, name: &str, version: &str, desc_xml: &str) {
        write_package_with_files(dir, arch, name, version, desc_xml, &[]);
    }

    fn write_package_with_files(
        dir: &std::path::Path,
        arch: &str,
        name: &str,
        version: &str,
        desc_xml: &str,
        files: &[&str],
    ) {
        let arch_dir = dir.join(arch);
        std::fs::create_dir_all(&arch_dir).unwrap();
        let mut file_index = Vec::new();
        for path in files {
            let entry = tpm_core::FileEntry {
                path: (*path).to_string(),
                kind: tpm_core::FileKind::Regular,
                uid: 0,
                gid: 0,
                mode: 0o644,
                size: 0,
                sha1: [0u8; 20],
            };
            file_index.extend(tpm_transport::encode_file_record(&entry));
        }
        let sections: Vec<(SectionType, &[u8])> = if files.is_empty() {
            vec![(SectionType::Desc, desc_xml.as_bytes())]
        } else {
            vec![(SectionType::Desc, desc_xml.as_bytes()), (SectionType::FileIndex, &file_index)]
        };
        let raw = build_transport_file(&sections);
        std::fs::write(arch_dir.join(format!("{name}-{version}_{arch}.tpm2")), raw).unwrap();
    }

    fn desc(name: &str, version: &str, deps: &str) -> String {
        format!(
            r#"<pkg file_version="2.0">
                <name>{name}</name>
                <arch>amd64</arch>
                <version>{version}</version>
                <source_version>{version}</source_version>
                <dependencies>{deps}</dependencies>
            </pkg>"#
        )
    }

    fn dep_xml(name: &str, op: &str, version: &str) -> String {
        format!(
            r#"<dep><name>{name}</name><arch>amd64</arch><constr type="{op}">{version}</constr></dep>"#
        )
    }

    #[test]
    fn resolves_a_fresh_install_with_a_transitive_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), "amd64", "app", "1.0", &desc("app", "1.0", &dep_xml("libfoo", "geq", "1.0")));
        write_package(dir.path(), "amd64", "libfoo", "1.0", &desc("libfoo", "1.0", ""));

        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let selected = vec![SelectedPackage {
            name: "app".into(),
            arch: Architecture::Amd64,
            formula: Formula::always_true(),
        }];

        let graph = solve(&provider, &[], &selected, SolverConfig::default()).unwrap();
        let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
        assert!(names.contains(&"app"));
        assert!(names.contains(&"libfoo"));
    }

    #[test]
    fn a_file_conflict_ejects_the_losing_candidate_version() {
        let dir = tempfile::tempdir().unwrap();
        write_package_with_files(
            dir.path(),
            "amd64",
            "owner",
            "1.0",
            &desc("owner", "1.0", ""),
            &["/usr/bin/shared"],
        );
        write_package_with_files(dir.path(), "amd64", "lib", "1.0", &desc("lib", "1.0", ""), &[]);
        write_package_with_files(
            dir.path(),
            "amd64",
            "lib",
            "2.0",
            &desc("lib", "2.0", ""),
            &["/usr/bin/shared"],
        );

        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let selected = vec![
            SelectedPackage { name: "owner".into(), arch: Architecture::Amd64, formula: Formula::always_true() },
            SelectedPackage { name: "lib".into(), arch: Architecture::Amd64, formula: Formula::always_true() },
        ];

        // `lib` 2.0 claims the same file `owner` already holds; the file
        // conflict term (weight 8) dominates the recency bias term (weight
        // 0.2), so the solver settles on `lib` 1.0, leaving `owner` intact.
        let graph = solve(&provider, &[], &selected, SolverConfig::default()).unwrap();
        let owner = graph.nodes.iter().find(|n| n.name == "owner").unwrap();
        let lib = graph.nodes.iter().find(|n| n.name == "lib").unwrap();
        assert_eq!(owner.chosen_version, Some(tpm_core::VersionNumber::parse("1.0").unwrap()));
        assert_eq!(lib.chosen_version, Some(tpm_core::VersionNumber::parse("1.0").unwrap()));
    }

    #[test]
    fn an_unsatisfiable_user_pin_on_a_nonexistent_package_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let selected = vec![SelectedPackage {
            name: "ghost".into(),
            arch: Architecture::Amd64,
            formula: Formula::always_true(),
        }];

        let result = solve(&provider, &[], &selected, SolverConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn keep_newer_policy_does_not_move_an_already_satisfying_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), "amd64", "app", "1.0", &desc("app", "1.0", ""));
        write_package(dir.path(), "amd64", "app", "2.0", &desc("app", "2.0", ""));

        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let installed = vec![InstalledPackage {
            name: "app".into(),
            arch: Architecture::Amd64,
            version: tpm_core::VersionNumber::parse("1.0").unwrap(),
            installed_automatically: false,
        }];
        let selected = vec![SelectedPackage {
            name: "app".into(),
            arch: Architecture::Amd64,
            formula: Formula::always_true(),
        }];

        let graph = solve(&provider, &installed, &selected, SolverConfig::default()).unwrap();
        let app = graph.nodes.iter().find(|n| n.name == "app").unwrap();
        assert_eq!(app.chosen_version, Some(tpm_core::VersionNumber::parse("1.0").unwrap()));
    }

    #[test]
    fn a_user_pin_forces_a_downgrade_below_the_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), "amd64", "app", "1.0", &desc("app", "1.0", ""));
        write_package(dir.path(), "amd64", "app", "2.0", &desc("app", "2.0", ""));
        write_package(dir.path(), "amd64", "app", "3.0", &desc("app", "3.0", ""));

        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let installed = vec![InstalledPackage {
            name: "app".into(),
            arch: Architecture::Amd64,
            version: tpm_core::VersionNumber::parse("2.0").unwrap(),
            installed_automatically: false,
        }];
        // The `⊥` pin pulls `c` to 1 for 1.0 and to `-∞` for every other
        // version — a weight the bias term (which would otherwise keep the
        // installed 2.0) can never outscore.
        let pin = Formula::Primitive(Constraint {
            target: ConstraintTarget::Binary,
            op: ConstraintOp::Eq,
            version: tpm_core::VersionNumber::parse("1.0").unwrap(),
        });
        let selected = vec![SelectedPackage { name: "app".into(), arch: Architecture::Amd64, formula: pin }];

        let graph = solve(&provider, &installed, &selected, SolverConfig::default()).unwrap();
        let app = graph.nodes.iter().find(|n| n.name == "app").unwrap();
        assert_eq!(app.chosen_version, Some(tpm_core::VersionNumber::parse("1.0").unwrap()));
    }
}
