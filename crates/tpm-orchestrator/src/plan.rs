//! Classifies the difference between the currently installed set and a
//! resolved [`tpm_depres::InstallationGraph`] into operations, and orders
//! those operations against file-path conflicts (spec §4.6).

use tpm_core::{AHashMap, Architecture, PackageMetaData, VersionNumber};
use tpm_depres::InstallationGraph;

/// What must happen to one `(name, arch)` package identity to go from the
/// installed set to the resolved graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Not currently installed; install the resolved version fresh.
    InstallNew,
    /// Installed and resolved to the same identity at a different version:
    /// the "install" half of an in-place upgrade (`*_change` states).
    ChangeInstall,
    /// Installed and resolved to the same identity at a different version:
    /// the "remove" half of an in-place upgrade.
    ChangeRemove,
    /// Installed, no longer wanted under any version.
    Remove,
    /// An install whose files collide with a `Remove`/`ChangeRemove`
    /// operation on a *different* package identity; ordering must remove
    /// the conflicting owner just before this one unpacks.
    ReplaceInstall,
    /// The removal side of a `ReplaceInstall` conflict.
    ReplaceRemove,
}

impl OperationKind {
    #[must_use]
    pub fn is_install(self) -> bool {
        matches!(self, Self::InstallNew | Self::ChangeInstall | Self::ReplaceInstall)
    }

    #[must_use]
    pub fn is_change(self) -> bool {
        matches!(self, Self::ChangeInstall | Self::ChangeRemove)
    }
}

/// One unit of orchestrator work.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: String,
    pub arch: Architecture,
    pub old_version: Option<VersionNumber>,
    pub new_version: Option<VersionNumber>,
}

/// Diffs `installed` against `graph`, producing one operation per package
/// identity that changes. Packages resolved to their already-installed
/// version are left out entirely — there is nothing for the orchestrator
/// to do for them.
#[must_use]
pub fn classify_operations(graph: &InstallationGraph, installed: &[PackageMetaData]) -> Vec<Operation> {
    let mut installed_by_key: AHashMap<(String, Architecture), &PackageMetaData> = AHashMap::new();
    for md in installed {
        installed_by_key.insert((md.name.clone(), md.arch), md);
    }
    let mut desired_keys: AHashMap<(String, Architecture), VersionNumber> = AHashMap::new();

    let mut operations = Vec::new();

    for node in &graph.nodes {
        let Some(new_version) = node.chosen_version.clone() else {
            continue;
        };
        let key = (node.name.clone(), node.arch);
        desired_keys.insert(key.clone(), new_version.clone());

        match installed_by_key.get(&key) {
            None => operations.push(Operation {
                kind: OperationKind::InstallNew,
                name: node.name.clone(),
                arch: node.arch,
                old_version: None,
                new_version: Some(new_version),
            }),
            Some(md) if md.version != new_version => {
                operations.push(Operation {
                    kind: OperationKind::ChangeInstall,
                    name: node.name.clone(),
                    arch: node.arch,
                    old_version: Some(md.version.clone()),
                    new_version: Some(new_version.clone()),
                });
                operations.push(Operation {
                    kind: OperationKind::ChangeRemove,
                    name: node.name.clone(),
                    arch: node.arch,
                    old_version: Some(md.version.clone()),
                    new_version: Some(new_version),
                });
            }
            Some(_) => {}
        }
    }

    for md in installed {
        let key = (md.name.clone(), md.arch);
        if !desired_keys.contains_key(&key) {
            operations.push(Operation {
                kind: OperationKind::Remove,
                name: md.name.clone(),
                arch: md.arch,
                old_version: Some(md.version.clone()),
                new_version: None,
            });
        }
    }

    operations
}

/// Promotes an `InstallNew`/`Remove` pair that collide over file paths into
/// `ReplaceInstall`/`ReplaceRemove`, recording that the removal must run
/// just before the install unpacks. Returns the files-to-installs map so
/// the caller does not need to re-derive it.
pub fn mark_file_conflicts(
    operations: &mut [Operation],
    files_by_install: &AHashMap<(String, Architecture), Vec<String>>,
    files_by_remove: &AHashMap<(String, Architecture), Vec<String>>,
) -> Vec<((String, Architecture), (String, Architecture))> {
    let mut owners: AHashMap<&str, (String, Architecture)> = AHashMap::new();
    for (key, files) in files_by_remove {
        for path in files {
            owners.insert(path.as_str(), key.clone());
        }
    }

    let mut conflicts = Vec::new();
    for op in operations.iter() {
        if !matches!(op.kind, OperationKind::InstallNew) {
            continue;
        }
        let key = (op.name.clone(), op.arch);
        let Some(files) = files_by_install.get(&key) else {
            continue;
        };
        for path in files {
            if let Some(owner) = owners.get(path.as_str()) {
                if *owner != key {
                    conflicts.push((key.clone(), owner.clone()));
                }
            }
        }
    }

    for op in operations.iter_mut() {
        let key = (op.name.clone(), op.arch);
        if op.kind == OperationKind::InstallNew && conflicts.iter().any(|(install, _)| *install == key) {
            op.kind = OperationKind::ReplaceInstall;
        }
        if op.kind == OperationKind::Remove && conflicts.iter().any(|(_, remove)| *remove == key) {
            op.kind = OperationKind::ReplaceRemove;
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_core::{InstallationReason, PackageState};
    use tpm_depres::ResolvedNode;

    fn md(name: &str, version: &str) -> PackageMetaData {
        PackageMetaData {
            name: name.into(),
            arch: Architecture::Amd64,
            version: VersionNumber::parse(version).unwrap(),
            source_version: VersionNumber::parse(version).unwrap(),
            state: PackageState::Configured,
            installation_reason: InstallationReason::Manual,
            pre_dependencies: vec![],
            dependencies: vec![],
            interested_triggers: vec![],
            activated_triggers: vec![],
        }
    }

    fn node(name: &str, version: Option<&str>) -> ResolvedNode {
        ResolvedNode {
            name: name.into(),
            arch: Architecture::Amd64,
            chosen_version: version.map(|v| VersionNumber::parse(v).unwrap()),
            installed_version: None,
            is_selected: true,
            installed_automatically: false,
            dependencies: vec![],
            pre_dependencies: vec![],
        }
    }

    #[test]
    fn a_brand_new_package_is_install_new() {
        let graph = InstallationGraph { nodes: vec![node("foo", Some("1.0"))] };
        let ops = classify_operations(&graph, &[]);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::InstallNew);
    }

    #[test]
    fn a_version_bump_yields_a_change_pair() {
        let graph = InstallationGraph { nodes: vec![node("foo", Some("2.0"))] };
        let ops = classify_operations(&graph, &[md("foo", "1.0")]);
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().any(|o| o.kind == OperationKind::ChangeInstall));
        assert!(ops.iter().any(|o| o.kind == OperationKind::ChangeRemove));
    }

    #[test]
    fn an_unwanted_installed_package_is_removed() {
        let graph = InstallationGraph { nodes: vec![] };
        let ops = classify_operations(&graph, &[md("foo", "1.0")]);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Remove);
    }

    #[test]
    fn an_unchanged_package_produces_no_operation() {
        let graph = InstallationGraph { nodes: vec![node("foo", Some("1.0"))] };
        let ops = classify_operations(&graph, &[md("foo", "1.0")]);
        assert!(ops.is_empty());
    }

    #[test]
    fn colliding_files_promote_install_new_and_remove_to_replace() {
        let graph = InstallationGraph { nodes: vec![node("b", Some("1.0"))] };
        let mut ops = classify_operations(&graph, &[md("a", "1.0")]);
        let mut install_files = AHashMap::new();
        install_files.insert(("b".to_string(), Architecture::Amd64), vec!["/usr/bin/x".to_string()]);
        let mut remove_files = AHashMap::new();
        remove_files.insert(("a".to_string(), Architecture::Amd64), vec!["/usr/bin/x".to_string()]);

        let conflicts = mark_file_conflicts(&mut ops, &install_files, &remove_files);
        assert_eq!(conflicts.len(), 1);
        assert!(ops.iter().any(|o| o.kind == OperationKind::ReplaceInstall));
        assert!(ops.iter().any(|o| o.kind == OperationKind::ReplaceRemove));
    }
}
