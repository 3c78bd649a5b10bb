//! Shared argument parsing and database-to-solver plumbing used by every
//! operation module.

use tpm_core::{Architecture, Error, InstallationReason, PackageState, Result};
use tpm_db::PackageDb;
use tpm_depres::InstalledPackage;

/// Splits a CLI package argument into `(name, arch)`, defaulting to amd64
/// when no `/arch` suffix is given (spec §6 gives no default; amd64 matches
/// every fixture and example package in this workspace).
pub fn parse_package_arg(arg: &str) -> Result<(String, Architecture)> {
    match arg.split_once('/') {
        Some((name, arch)) => Ok((name.to_string(), arch.parse()?)),
        None => Ok((arg.to_string(), Architecture::Amd64)),
    }
}

/// Every package currently in the terminal `configured` state, as the
/// solver's `installed` snapshot.
pub fn installed_packages(db: &PackageDb) -> Result<Vec<InstalledPackage>> {
    Ok(db
        .get_packages_in_state(Some(PackageState::Configured))?
        .into_iter()
        .map(|md| InstalledPackage {
            name: md.name,
            arch: md.arch,
            version: md.version,
            installed_automatically: md.installation_reason == InstallationReason::Auto,
        })
        .collect())
}

/// Looks up a single installed package's full metadata by name, defaulting
/// the architecture the same way [`parse_package_arg`] does.
pub fn find_installed(db: &PackageDb, arg: &str) -> Result<tpm_core::PackageMetaData> {
    let (name, arch) = parse_package_arg(arg)?;
    let candidates = db.get_packages_in_state(Some(PackageState::Configured))?;
    candidates
        .into_iter()
        .find(|md| md.name == name && md.arch == arch)
        .ok_or_else(|| Error::DbIntegrity(format!("{name}/{arch} is not installed")))
}
