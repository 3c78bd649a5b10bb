//! Package metadata shared by the database, the provider, and the
//! orchestrator (spec §4).

use std::fmt;

use crate::architecture::Architecture;
use crate::state::{InstallationReason, PackageState};
use crate::version::{Formula, VersionNumber};

/// A `(name, arch)` pair naming a package independent of version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentifier {
    pub name: String,
    pub arch: Architecture,
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arch)
    }
}

/// One dependency or pre-dependency edge: the named target plus the
/// constraint formula it must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub arch: Architecture,
    pub constraint: Formula,
}

/// The kind of a tracked file (spec §6's `FileRecord.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
}

/// One row of a package's file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub kind: FileKind,
    pub uid: u32,
    pub gid: u32,
    pub mode: u16,
    pub size: u32,
    /// SHA-1 digest, 20 bytes.
    pub sha1: [u8; 20],
}

/// Full metadata for a package, installed or in-progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetaData {
    pub name: String,
    pub arch: Architecture,
    /// Binary package version.
    pub version: VersionNumber,
    /// The version of the upstream source this binary was built from.
    pub source_version: VersionNumber,
    pub state: PackageState,
    pub installation_reason: InstallationReason,
    pub pre_dependencies: Vec<Dependency>,
    pub dependencies: Vec<Dependency>,
    pub interested_triggers: Vec<String>,
    pub activated_triggers: Vec<String>,
}

impl PackageMetaData {
    #[must_use]
    pub fn identifier(&self) -> PackageIdentifier {
        PackageIdentifier {
            name: self.name.clone(),
            arch: self.arch,
        }
    }
}
