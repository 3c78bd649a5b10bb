//! Public input/output types for a resolution run.

use tpm_core::{Architecture, Formula, VersionNumber};

/// A currently-installed package, as seeded into the graph.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub name: String,
    pub arch: Architecture,
    pub version: VersionNumber,
    pub installed_automatically: bool,
}

/// A package the user asked to install, upgrade, or pin (the `selected` set).
#[derive(Debug, Clone)]
pub struct SelectedPackage {
    pub name: String,
    pub arch: Architecture,
    pub formula: Formula,
}

/// One resolved node of the final installation graph.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub name: String,
    pub arch: Architecture,
    pub chosen_version: Option<VersionNumber>,
    pub installed_version: Option<VersionNumber>,
    pub is_selected: bool,
    pub installed_automatically: bool,
    pub dependencies: Vec<(String, Architecture)>,
    pub pre_dependencies: Vec<(String, Architecture)>,
}

/// The result of a successful resolution: every surviving node.
#[derive(Debug, Clone, Default)]
pub struct InstallationGraph {
    pub nodes: Vec<ResolvedNode>,
}
