//! `Provider`: an ordered list of repositories queried as one unit
//! (spec §4.4).

use tpm_core::{AHashSet, Architecture, Result, VersionNumber};
use tracing::warn;

use crate::provided_package::ProvidedPackage;
use crate::repository::Repository;

/// Merges an ordered list of [`Repository`] sources. Earlier repositories
/// take priority when more than one offers the same `(name, arch, version)`.
#[derive(Debug, Default)]
pub struct Provider {
    repositories: Vec<Box<dyn Repository>>,
}

impl Provider {
    #[must_use]
    pub fn new(repositories: Vec<Box<dyn Repository>>) -> Self {
        Self { repositories }
    }

    /// The union of every repository's offered versions for `(name, arch)`.
    /// A repository that fails is logged and skipped (spec §7's propagation
    /// policy for external data sources), not fatal to the merge.
    pub fn list_package_versions(&self, name: &str, arch: Architecture) -> Result<AHashSet<VersionNumber>> {
        let mut versions = AHashSet::new();
        for (index, repo) in self.repositories.iter().enumerate() {
            match repo.list_package_versions(name, arch) {
                Ok(vs) => versions.extend(vs),
                Err(e) => warn!(repository = index, error = %e, "skipping repository that failed to enumerate"),
            }
        }
        Ok(versions)
    }

    /// The highest-priority repository's copy of `(name, arch, version)`,
    /// or `None` if no configured repository has it.
    pub fn get_package(
        &self,
        name: &str,
        arch: Architecture,
        version: &VersionNumber,
    ) -> Result<Option<ProvidedPackage>> {
        for (index, repo) in self.repositories.iter().enumerate() {
            match repo.get_package(name, arch, version) {
                Ok(Some(pkg)) => return Ok(Some(pkg)),
                Ok(None) => {}
                Err(e) => warn!(repository = index, error = %e, "skipping repository that failed to read package"),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory_repository::DirectoryRepository;
    use tpm_transport::{SectionType, build_transport_file};

    #[test]
    fn merges_versions_from_two_repositories() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        for (dir, version) in [(&dir_a, "1.0"), (&dir_b, "2.0")] {
            let arch_dir = dir.path().join("amd64");
            std::fs::create_dir_all(&arch_dir).unwrap();
            let raw = build_transport_file(&[(SectionType::Desc, b"<pkg/>")]);
            std::fs::write(arch_dir.join(format!("libfoo-{version}_amd64.tpm2")), raw).unwrap();
        }

        let provider = Provider::new(vec![
            Box::new(DirectoryRepository::new(dir_a.path().to_path_buf())),
            Box::new(DirectoryRepository::new(dir_b.path().to_path_buf())),
        ]);

        let versions = provider.list_package_versions("libfoo", Architecture::Amd64).unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[test]
    fn earlier_repository_wins_on_get_package() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        for dir in [&dir_a, &dir_b] {
            let arch_dir = dir.path().join("amd64");
            std::fs::create_dir_all(&arch_dir).unwrap();
            let raw = build_transport_file(&[(SectionType::Desc, b"<pkg/>")]);
            std::fs::write(arch_dir.join("libfoo-1.0_amd64.tpm2"), raw).unwrap();
        }

        let provider = Provider::new(vec![
            Box::new(DirectoryRepository::new(dir_a.path().to_path_buf())),
            Box::new(DirectoryRepository::new(dir_b.path().to_path_buf())),
        ]);

        let pkg = provider
            .get_package("libfoo", Architecture::Amd64, &VersionNumber::parse("1.0").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(pkg.origin().parent().unwrap().parent().unwrap(), dir_a.path());
    }
}
