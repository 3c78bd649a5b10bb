//! The ten low-level state-machine steps (spec §4.6). Each step's
//! precondition is exactly the persisted state left by the step before it;
//! each step ends by persisting the next one, so a kill between any two
//! steps leaves the system resumable.

use std::path::Path;

use sha1::{Digest, Sha1};
use tpm_core::{Architecture, Error, InstallationReason, PackageIdentifier, PackageState, Result, VersionNumber};
use tpm_db::PackageDb;
use tpm_filetrie::Trie;
use tpm_provider::Provider;
use tpm_transport::SectionType;
use tracing::info;

use crate::scripts;

/// Shared, mutable execution context threaded through every low-level step.
pub struct Context<'a> {
    pub db: &'a mut PackageDb,
    pub provider: &'a Provider,
    pub target: &'a Path,
    /// Paths currently claimed in the target filesystem, mapped to their
    /// owning package. Seeded from the database at startup and kept in
    /// sync so `ll_unpack`/`ll_rm_files` can see both an old and a new
    /// owner mid-change.
    pub file_owners: Trie<PackageIdentifier>,
    pub adopt_all: bool,
}

fn violation(name: &str, arch: Architecture, actual: PackageState, expected: PackageState) -> Error {
    Error::StateMachineViolation {
        name: name.to_string(),
        arch: arch.to_string(),
        actual: actual.to_string(),
        expected: expected.to_string(),
    }
}

fn sha1_of(bytes: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// `wanted` → `preinst_*` → `unpack_*`. Creates the package's database rows
/// in one transaction together with its dependency, file, and config-file
/// lists, stores its maintainer scripts, then runs `preinst`.
pub fn ll_run_preinst(
    ctx: &mut Context,
    name: &str,
    arch: Architecture,
    version: &VersionNumber,
    reason: InstallationReason,
    is_change: bool,
) -> Result<()> {
    let id = PackageIdentifier { name: name.to_string(), arch };

    if let Some(existing) = ctx.db.get_reduced_package(name, arch, version)? {
        if existing.state != PackageState::Wanted {
            return Err(violation(name, arch, existing.state, PackageState::Wanted));
        }
    }

    let pkg = ctx
        .provider
        .get_package(name, arch, version)?
        .ok_or_else(|| Error::Solver(format!("{name}/{arch} {version} is no longer offered by any repository")))?;
    let descriptor = pkg.mdata()?;
    let files = pkg.file_list()?;
    let config_files = pkg.config_files()?;

    let entry_state = if is_change { PackageState::PreinstChange } else { PackageState::PreinstBegin };
    let md = descriptor.into_metadata(entry_state, reason);

    {
        let tx = ctx.db.begin()?;
        tx.update_or_create_package(&md)?;
        tx.set_dependencies(&md)?;
        tx.set_files(&md, &files)?;
        tx.set_config_files(&md, &config_files)?;
        tx.set_interested_triggers(&md, &md.interested_triggers)?;
        tx.commit()?;
    }
    scripts::store(ctx.target, &pkg, name, arch, version)?;

    let args: &[&str] = if is_change { &["change"] } else { &[] };
    scripts::run(ctx.target, name, arch, version, SectionType::Preinst, args)?;

    let exit_state = if is_change { PackageState::UnpackChange } else { PackageState::UnpackBegin };
    ctx.db.update_state(&id, version, exit_state)?;
    info!(name, %arch, %version, %is_change, "ran preinst");
    Ok(())
}

/// Unpacks the archive, excluding any config file whose on-disk digest
/// already diverges from the packaged one (it survives as a local edit).
/// Exits in `configure_begin`, or `wait_old_removed` for a change, where it
/// waits for the old version's files to be cleared first.
pub fn ll_unpack(ctx: &mut Context, name: &str, arch: Architecture, version: &VersionNumber, is_change: bool) -> Result<()> {
    let id = PackageIdentifier { name: name.to_string(), arch };
    let expected = if is_change { PackageState::UnpackChange } else { PackageState::UnpackBegin };
    let md = ctx
        .db
        .get_reduced_package(name, arch, version)?
        .ok_or_else(|| Error::DbIntegrity(format!("{id} {version} has no row to unpack")))?;
    if md.state != expected {
        return Err(violation(name, arch, md.state, expected));
    }

    let pkg = ctx
        .provider
        .get_package(name, arch, version)?
        .ok_or_else(|| Error::Solver(format!("{id} {version} is no longer offered by any repository")))?;

    let mut excluded = Vec::new();
    for path in ctx.db.get_config_files(&md)? {
        let on_disk = ctx.target.join(path.trim_start_matches('/'));
        if let Ok(bytes) = std::fs::read(&on_disk) {
            if let Some(recorded) = ctx.db.get_file(&md, &path)? {
                if sha1_of(&bytes) != recorded.sha1 {
                    excluded.push(path);
                }
            }
        }
    }

    pkg.unpack_archive_to_directory(ctx.target, &excluded)?;

    for file in ctx.db.get_files(&md)? {
        claim_file(ctx, &file.path, id.clone());
    }

    let exit_state = if is_change { PackageState::WaitOldRemoved } else { PackageState::ConfigureBegin };
    ctx.db.update_state(&id, version, exit_state)?;
    info!(name, %arch, %version, excluded = excluded.len(), "unpacked archive");
    Ok(())
}

/// From `configured` (plain remove) or the matching `*_change` start state,
/// runs `unconfigure` and queues its declared activations. Exits in
/// `rm_files_begin`, or `wait_new_unpacked` for a change.
pub fn ll_unconfigure(ctx: &mut Context, name: &str, arch: Architecture, version: &VersionNumber, is_change: bool) -> Result<()> {
    let id = PackageIdentifier { name: name.to_string(), arch };
    let md = ctx
        .db
        .get_reduced_package(name, arch, version)?
        .ok_or_else(|| Error::DbIntegrity(format!("{id} {version} has no row to unconfigure")))?;
    if md.state != PackageState::Configured {
        return Err(violation(name, arch, md.state, PackageState::Configured));
    }

    let entry_state = if is_change { PackageState::UnconfigureChange } else { PackageState::UnconfigureBegin };
    ctx.db.update_state(&id, version, entry_state)?;

    let args: &[&str] = if is_change { &["change"] } else { &[] };
    scripts::run(ctx.target, name, arch, version, SectionType::Unconfigure, args)?;
    enqueue_activations(ctx, &md)?;

    let exit_state = if is_change { PackageState::WaitNewUnpacked } else { PackageState::RmFilesBegin };
    ctx.db.update_state(&id, version, exit_state)?;
    info!(name, %arch, %version, %is_change, "ran unconfigure");
    Ok(())
}

/// Removes every non-directory file not still owned by another package,
/// then directories longest-path-first if empty, preserving any config
/// file whose digest diverges from the DB record. On a change, also
/// advances the newly unpacked sibling row out of `wait_old_removed`.
pub fn ll_rm_files(
    ctx: &mut Context,
    name: &str,
    arch: Architecture,
    version: &VersionNumber,
    is_change: bool,
    new_version: Option<&VersionNumber>,
) -> Result<()> {
    let id = PackageIdentifier { name: name.to_string(), arch };
    let expected = if is_change { PackageState::WaitNewUnpacked } else { PackageState::RmFilesBegin };
    let md = ctx
        .db
        .get_reduced_package(name, arch, version)?
        .ok_or_else(|| Error::DbIntegrity(format!("{id} {version} has no row to remove files for")))?;
    if md.state != expected {
        return Err(violation(name, arch, md.state, expected));
    }

    let mut files = ctx.db.get_files(&md)?;
    // Longest path first so a directory's children are gone before the
    // directory itself is considered for removal.
    files.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
    let config_files: std::collections::HashSet<String> = ctx.db.get_config_files(&md)?.into_iter().collect();

    for file in &files {
        let on_disk = ctx.target.join(file.path.trim_start_matches('/'));
        let owners = ctx.db.find_owners_of_file(&file.path)?;
        if owners.iter().any(|o| *o != id) {
            release_file_if_owned(ctx, &file.path, &id);
            continue;
        }

        if config_files.contains(&file.path) {
            if let Ok(bytes) = std::fs::read(&on_disk) {
                if sha1_of(&bytes) != file.sha1 {
                    info!(path = %file.path, "preserving locally modified config file");
                    release_file_if_owned(ctx, &file.path, &id);
                    continue;
                }
            }
        }

        let remove_result = match file.kind {
            tpm_core::FileKind::Directory => std::fs::remove_dir(&on_disk),
            _ => std::fs::remove_file(&on_disk),
        };
        if let Err(e) = remove_result {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %file.path, error = %e, "failed to remove file, continuing");
            }
        }
        release_file_if_owned(ctx, &file.path, &id);
    }

    let exit_state = if is_change { PackageState::PostrmChange } else { PackageState::PostrmBegin };
    ctx.db.update_state(&id, version, exit_state)?;

    if is_change {
        let new_version = new_version.ok_or_else(|| Error::DbIntegrity(format!("{id} change-remove has no paired install version")))?;
        let new_id = id.clone();
        if let Some(new_md) = ctx.db.get_reduced_package(&new_id.name, new_id.arch, new_version)? {
            if new_md.state != PackageState::WaitOldRemoved {
                return Err(violation(&new_id.name, new_id.arch, new_md.state, PackageState::WaitOldRemoved));
            }
        }
        ctx.db.update_state(&new_id, new_version, PackageState::ConfigureBegin)?;
    }

    info!(name, %arch, %version, "removed files");
    Ok(())
}

/// Runs `postrm` and, in one transaction, deletes the maintainer-script
/// sidecar plus every database row for the package.
pub fn ll_run_postrm(ctx: &mut Context, name: &str, arch: Architecture, version: &VersionNumber, is_change: bool) -> Result<()> {
    let md = ctx
        .db
        .get_reduced_package(name, arch, version)?
        .ok_or_else(|| Error::DbIntegrity(format!("{name}/{arch} {version} has no row to finalize removal for")))?;
    let expected = if is_change { PackageState::PostrmChange } else { PackageState::PostrmBegin };
    if md.state != expected {
        return Err(violation(name, arch, md.state, expected));
    }

    let args: &[&str] = if is_change { &["change"] } else { &[] };
    scripts::run(ctx.target, name, arch, version, SectionType::Postrm, args)?;

    {
        let tx = ctx.db.begin()?;
        tx.delete_package(&md)?;
        tx.commit()?;
    }
    scripts::remove(ctx.target, name, arch, version)?;
    info!(name, %arch, %version, %is_change, "ran postrm and deleted package rows");
    Ok(())
}

/// Runs `configure`, queues its declared activations, and transitions to
/// `configured`.
pub fn ll_configure_package(ctx: &mut Context, name: &str, arch: Architecture, version: &VersionNumber, is_change: bool) -> Result<()> {
    let id = PackageIdentifier { name: name.to_string(), arch };
    let md = ctx
        .db
        .get_reduced_package(name, arch, version)?
        .ok_or_else(|| Error::DbIntegrity(format!("{id} {version} has no row to configure")))?;
    if md.state != PackageState::ConfigureBegin && md.state != PackageState::ConfigureChange {
        return Err(violation(name, arch, md.state, PackageState::ConfigureBegin));
    }

    let args: &[&str] = if is_change { &["change"] } else { &[] };
    scripts::run(ctx.target, name, arch, version, SectionType::Configure, args)?;
    enqueue_activations(ctx, &md)?;

    ctx.db.update_state(&id, version, PackageState::Configured)?;
    info!(name, %arch, %version, %is_change, "ran configure");
    Ok(())
}

/// Flips a package's `Manual`/`Auto` installation reason in place; never
/// touches its persisted state.
pub fn ll_change_installation_reason(
    ctx: &mut Context,
    name: &str,
    arch: Architecture,
    version: &VersionNumber,
    reason: InstallationReason,
) -> Result<()> {
    let id = PackageIdentifier { name: name.to_string(), arch };
    ctx.db.update_installation_reason(&id, version, reason)
}

fn enqueue_activations(ctx: &mut Context, md: &tpm_core::PackageMetaData) -> Result<()> {
    for trigger in &md.activated_triggers {
        ctx.db.activate_trigger(trigger)?;
    }
    Ok(())
}

fn claim_file(ctx: &mut Context, path: &str, owner: PackageIdentifier) {
    if ctx.file_owners.get_file_payload(path) == Some(&owner) {
        return;
    }
    ctx.file_owners.remove_element(path);
    ctx.file_owners.insert_file(path, owner);
}

fn release_file_if_owned(ctx: &mut Context, path: &str, owner: &PackageIdentifier) {
    if ctx.file_owners.get_file_payload(path) == Some(owner) {
        ctx.file_owners.remove_element(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_db::PackageDb;
    use tpm_provider::{DirectoryRepository, Provider};
    use tpm_transport::{build_transport_file, encode_config_files};

    fn desc_xml(name: &str, version: &str) -> String {
        format!(
            r#"<pkg file_version="2.0">
                <name>{name}</name>
                <arch>amd64</arch>
                <version>{version}</version>
                <source_version>{version}</source_version>
                <dependencies></dependencies>
            </pkg>"#
        )
    }

    /// A minimal single-entry ustar archive `tar -x` can unpack, with the
    /// two all-zero trailer blocks the format requires.
    fn build_tar_single_file(path: &str, content: &[u8]) -> Vec<u8> {
        let mut header = [0u8; 512];
        let name = path.as_bytes();
        header[..name.len()].copy_from_slice(name);
        header[100..108].copy_from_slice(b"0000644\0");
        header[108..116].copy_from_slice(b"0000000\0");
        header[116..124].copy_from_slice(b"0000000\0");
        let size = format!("{:011o}\0", content.len());
        header[124..124 + size.len()].copy_from_slice(size.as_bytes());
        header[136..148].copy_from_slice(b"00000000000\0");
        header[148..156].copy_from_slice(b"        ");
        header[156] = b'0';
        header[257..263].copy_from_slice(b"ustar\0");
        header[263..265].copy_from_slice(b"00");
        let checksum: u32 = header.iter().map(|&b| u32::from(b)).sum();
        let checksum_field = format!("{checksum:06o}\0 ");
        header[148..148 + checksum_field.len()].copy_from_slice(checksum_field.as_bytes());

        let mut out = header.to_vec();
        out.extend_from_slice(content);
        let padding = (512 - content.len() % 512) % 512;
        out.extend(std::iter::repeat(0u8).take(padding));
        out.extend(std::iter::repeat(0u8).take(1024));
        out
    }

    fn write_package(dir: &Path, name: &str, version: &VersionNumber, sections: &[(SectionType, &[u8])]) {
        let arch_dir = dir.join("amd64");
        std::fs::create_dir_all(&arch_dir).unwrap();
        let raw = build_transport_file(sections);
        std::fs::write(arch_dir.join(format!("{name}-{version}_amd64.tpm2")), raw).unwrap();
    }

    #[test]
    fn ll_unpack_preserves_a_locally_modified_config_file() {
        let repo_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let version = VersionNumber::parse("1.0").unwrap();

        let archive = build_tar_single_file("etc/app.conf", b"packaged\n");
        let config_files = encode_config_files(&["/etc/app.conf".to_string()]);
        let desc = desc_xml("conf-app", "1.0");
        write_package(
            repo_dir.path(),
            "conf-app",
            &version,
            &[
                (SectionType::Desc, desc.as_bytes()),
                (SectionType::ConfigFiles, &config_files),
                (SectionType::Archive, &archive),
            ],
        );

        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(repo_dir.path().to_path_buf()))]);
        let mut db = PackageDb::open_in_memory().unwrap();
        let mut ctx = Context {
            db: &mut db,
            provider: &provider,
            target: target_dir.path(),
            file_owners: Trie::new(),
            adopt_all: false,
        };

        ll_run_preinst(&mut ctx, "conf-app", Architecture::Amd64, &version, InstallationReason::Manual, false).unwrap();

        let conf_path = target_dir.path().join("etc/app.conf");
        std::fs::create_dir_all(conf_path.parent().unwrap()).unwrap();
        std::fs::write(&conf_path, b"locally-edited\n").unwrap();

        ll_unpack(&mut ctx, "conf-app", Architecture::Amd64, &version, false).unwrap();

        assert_eq!(std::fs::read(&conf_path).unwrap(), b"locally-edited\n");
        let md = ctx.db.get_reduced_package("conf-app", Architecture::Amd64, &version).unwrap().unwrap();
        assert_eq!(md.state, PackageState::ConfigureBegin);
    }

    #[test]
    fn unpack_resumes_after_a_restart_between_preinst_and_unpack() {
        let repo_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let db_dir = tempfile::tempdir().unwrap();
        let db_path = db_dir.path().join("tpm.db");
        let version = VersionNumber::parse("1.0").unwrap();

        let archive = build_tar_single_file("usr/bin/app", b"binary\n");
        let desc = desc_xml("app", "1.0");
        write_package(
            repo_dir.path(),
            "app",
            &version,
            &[(SectionType::Desc, desc.as_bytes()), (SectionType::Archive, &archive)],
        );
        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(repo_dir.path().to_path_buf()))]);

        {
            let mut db = PackageDb::open_at(&db_path).unwrap();
            let mut ctx = Context {
                db: &mut db,
                provider: &provider,
                target: target_dir.path(),
                file_owners: Trie::new(),
                adopt_all: false,
            };
            ll_run_preinst(&mut ctx, "app", Architecture::Amd64, &version, InstallationReason::Manual, false).unwrap();
            // `db` and `ctx` drop here, simulating a kill right after
            // preinst persisted `unpack_begin` but before unpacking ran.
        }

        let mut db = PackageDb::open_at(&db_path).unwrap();
        let md = db.get_reduced_package("app", Architecture::Amd64, &version).unwrap().unwrap();
        assert_eq!(md.state, PackageState::UnpackBegin);

        let mut ctx = Context {
            db: &mut db,
            provider: &provider,
            target: target_dir.path(),
            file_owners: Trie::new(),
            adopt_all: false,
        };
        ll_unpack(&mut ctx, "app", Architecture::Amd64, &version, false).unwrap();

        assert_eq!(std::fs::read(target_dir.path().join("usr/bin/app")).unwrap(), b"binary\n");
        let md = ctx.db.get_reduced_package("app", Architecture::Amd64, &version).unwrap().unwrap();
        assert_eq!(md.state, PackageState::ConfigureBegin);
    }
}
