//! Storage and execution of a package's maintainer scripts (spec §6's
//! `<target>/var/lib/tpm/<name>-<version>_<arch>.tpm2sms` sidecar).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tpm_core::{Architecture, Error, Result, VersionNumber};
use tpm_provider::ProvidedPackage;
use tpm_transport::{SectionType, build_transport_file, read_transport_file};
use tracing::debug;

#[must_use]
pub fn sidecar_path(target: &Path, name: &str, arch: Architecture, version: &VersionNumber) -> PathBuf {
    target.join("var/lib/tpm").join(format!("{name}-{version}_{arch}.tpm2sms"))
}

/// Copies `pkg`'s maintainer-script sections into its sidecar, dropping the
/// archive and desc sections — the only two a running package no longer
/// needs once it is unpacked.
pub fn store(target: &Path, pkg: &ProvidedPackage, name: &str, arch: Architecture, version: &VersionNumber) -> Result<()> {
    let mut sections: Vec<(SectionType, &[u8])> = Vec::new();
    if let Some(s) = pkg.preinst() {
        sections.push((SectionType::Preinst, s));
    }
    if let Some(s) = pkg.configure() {
        sections.push((SectionType::Configure, s));
    }
    if let Some(s) = pkg.unconfigure() {
        sections.push((SectionType::Unconfigure, s));
    }
    if let Some(s) = pkg.postrm() {
        sections.push((SectionType::Postrm, s));
    }

    let path = sidecar_path(target, name, arch, version);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::Io { path: parent.to_path_buf(), source })?;
    }
    std::fs::write(&path, build_transport_file(&sections)).map_err(|source| Error::Io { path, source })
}

/// Deletes a package's sidecar, ignoring a missing file.
pub fn remove(target: &Path, name: &str, arch: Architecture, version: &VersionNumber) -> Result<()> {
    let path = sidecar_path(target, name, arch, version);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::Io { path, source }),
    }
}

fn section_label(section: SectionType) -> &'static str {
    match section {
        SectionType::Preinst => "preinst",
        SectionType::Configure => "configure",
        SectionType::Unconfigure => "unconfigure",
        SectionType::Postrm => "postrm",
        _ => "script",
    }
}

/// Runs `section` out of a package's stored sidecar with `args`, if that
/// section was declared at all. A package without the hook is a silent
/// no-op, matching maintainer scripts being optional.
pub fn run(
    target: &Path,
    name: &str,
    arch: Architecture,
    version: &VersionNumber,
    section: SectionType,
    args: &[&str],
) -> Result<()> {
    let sidecar = sidecar_path(target, name, arch, version);
    if !sidecar.exists() {
        return Ok(());
    }
    let transport = read_transport_file(&sidecar)?;
    let Some(bytes) = transport.section(section) else {
        return Ok(());
    };

    let tmp_dir = target.join("tmp/tpm2");
    std::fs::create_dir_all(&tmp_dir).map_err(|source| Error::Io { path: tmp_dir.clone(), source })?;
    let script_path = tmp_dir.join(format!("{name}-{arch}-{}", section_label(section)));
    std::fs::write(&script_path, bytes).map_err(|source| Error::Io { path: script_path.clone(), source })?;
    set_executable(&script_path)?;

    debug!(name, %arch, %version, script = section_label(section), ?args, "running maintainer script");
    let status = Command::new(&script_path)
        .args(args)
        .env("TPM_TARGET", target)
        .stdin(Stdio::null())
        .status()
        .map_err(|source| Error::Io { path: script_path.clone(), source })?;

    let _ = std::fs::remove_file(&script_path);

    if !status.success() {
        return Err(Error::Io {
            path: script_path,
            source: std::io::Error::other(format!("{} script exited with {status}", section_label(section))),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_transport::build_transport_file;

    #[test]
    fn a_package_without_a_hook_is_a_silent_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path();
        let version = VersionNumber::parse("1.0").unwrap();
        let raw = build_transport_file(&[(SectionType::Preinst, b"#!/bin/sh\nexit 0\n")]);
        let path = sidecar_path(target, "foo", Architecture::Amd64, &version);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, raw).unwrap();

        run(target, "foo", Architecture::Amd64, &version, SectionType::Postrm, &[]).unwrap();
    }

    #[test]
    fn missing_sidecar_is_a_silent_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let version = VersionNumber::parse("1.0").unwrap();
        run(dir.path(), "foo", Architecture::Amd64, &version, SectionType::Preinst, &[]).unwrap();
    }
}
