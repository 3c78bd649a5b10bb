//! `DirectoryRepository`: a repository that enumerates `.tpm2` files laid
//! out flat under `<root>/<arch>/` (spec §4.4).

use std::path::PathBuf;

use tpm_core::{Architecture, Result, VersionNumber};
use tracing::warn;

use crate::provided_package::ProvidedPackage;
use crate::repository::Repository;

/// A single on-disk directory of packages.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
}

impl DirectoryRepository {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn arch_dir(&self, arch: Architecture) -> PathBuf {
        self.root.join(arch.to_string())
    }

    fn package_filename(name: &str, version: &VersionNumber, arch: Architecture) -> String {
        format!("{name}-{version}_{arch}.tpm2")
    }
}

impl Repository for DirectoryRepository {
    fn list_package_versions(&self, name: &str, arch: Architecture) -> Result<Vec<VersionNumber>> {
        let dir = self.arch_dir(arch);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(tpm_core::Error::Io { path: dir, source }),
        };

        let prefix = format!("{name}-");
        let suffix = format!("_{arch}.tpm2");
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| tpm_core::Error::Io { path: dir.clone(), source })?;
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(rest) = filename.strip_prefix(&prefix) else {
                continue;
            };
            let Some(version_str) = rest.strip_suffix(&suffix) else {
                continue;
            };
            match VersionNumber::parse(version_str) {
                Ok(version) => versions.push(version),
                Err(e) => warn!(file = %filename, error = %e, "skipping unparseable package filename"),
            }
        }
        Ok(versions)
    }

    fn get_package(
        &self,
        name: &str,
        arch: Architecture,
        version: &VersionNumber,
    ) -> Result<Option<ProvidedPackage>> {
        let path = self.arch_dir(arch).join(Self::package_filename(name, version, arch));
        if !path.exists() {
            return Ok(None);
        }
        let transport = tpm_transport::read_transport_file(&path)?;
        Ok(Some(ProvidedPackage::new(transport, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_transport::{SectionType, build_transport_file};

    #[test]
    fn lists_versions_matching_the_naming_convention() {
        let dir = tempfile::tempdir().unwrap();
        let arch_dir = dir.path().join("amd64");
        std::fs::create_dir_all(&arch_dir).unwrap();
        std::fs::write(arch_dir.join("libfoo-1.2_amd64.tpm2"), b"junk").unwrap();
        std::fs::write(arch_dir.join("libfoo-1.3_amd64.tpm2"), b"junk").unwrap();
        std::fs::write(arch_dir.join("libbar-1.0_amd64.tpm2"), b"junk").unwrap();

        let repo = DirectoryRepository::new(dir.path().to_path_buf());
        let mut versions = repo.list_package_versions("libfoo", Architecture::Amd64).unwrap();
        versions.sort();
        assert_eq!(
            versions,
            vec![VersionNumber::parse("1.2").unwrap(), VersionNumber::parse("1.3").unwrap()]
        );
    }

    #[test]
    fn get_package_reads_the_exact_file() {
        let dir = tempfile::tempdir().unwrap();
        let arch_dir = dir.path().join("amd64");
        std::fs::create_dir_all(&arch_dir).unwrap();
        let raw = build_transport_file(&[(SectionType::Desc, b"<pkg/>")]);
        std::fs::write(arch_dir.join("libfoo-1.2_amd64.tpm2"), raw).unwrap();

        let repo = DirectoryRepository::new(dir.path().to_path_buf());
        let pkg = repo
            .get_package("libfoo", Architecture::Amd64, &VersionNumber::parse("1.2").unwrap())
            .unwrap();
        assert!(pkg.is_some());
    }

    #[test]
    fn missing_arch_directory_yields_no_versions() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DirectoryRepository::new(dir.path().to_path_buf());
        assert!(repo.list_package_versions("libfoo", Architecture::Amd64).unwrap().is_empty());
    }
}
