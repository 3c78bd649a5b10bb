//! The [`Repository`] trait implemented by each package source.

use std::fmt::Debug;

use tpm_core::{Architecture, Result, VersionNumber};

use crate::provided_package::ProvidedPackage;

/// A single source of packages — a local directory today; a mirror or a
/// cache could implement this in the future without touching [`crate::Provider`].
pub trait Repository: Debug {
    /// Every version this repository offers for `(name, arch)`.
    fn list_package_versions(&self, name: &str, arch: Architecture) -> Result<Vec<VersionNumber>>;

    /// The package at exactly `version`, if this repository has it.
    fn get_package(
        &self,
        name: &str,
        arch: Architecture,
        version: &VersionNumber,
    ) -> Result<Option<ProvidedPackage>>;
}
