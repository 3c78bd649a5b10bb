//! The public package-database operations (spec §4.3), implemented as free
//! functions over `&Connection` so they work unchanged whether called
//! directly on [`crate::PackageDb`] or grouped inside a [`crate::Transaction`].

use rusqlite::{Connection, OptionalExtension, params};
use tpm_core::{
    Architecture, Dependency, Error, FileEntry, FileKind, InstallationReason, PackageIdentifier,
    PackageMetaData, PackageState, Result, VersionNumber,
};

fn db_err(e: rusqlite::Error) -> Error {
    Error::DbEngine(e.to_string())
}

fn parse_arch(s: &str) -> Result<Architecture> {
    s.parse()
}

fn parse_version(s: &str) -> Result<VersionNumber> {
    VersionNumber::parse(s)
}

fn file_kind_to_str(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Regular => "regular",
        FileKind::Directory => "directory",
        FileKind::Symlink => "symlink",
    }
}

fn file_kind_from_str(s: &str) -> Result<FileKind> {
    match s {
        "regular" => Ok(FileKind::Regular),
        "directory" => Ok(FileKind::Directory),
        "symlink" => Ok(FileKind::Symlink),
        other => Err(Error::DbIntegrity(format!("unknown file type '{other}'"))),
    }
}

fn digest_to_vec(sha1: [u8; 20]) -> Vec<u8> {
    sha1.to_vec()
}

fn digest_from_slice(bytes: &[u8]) -> Result<[u8; 20]> {
    bytes
        .try_into()
        .map_err(|_| Error::DbIntegrity(format!("digest has {} bytes, expected 20", bytes.len())))
}

pub(crate) fn get_packages_in_state(
    conn: &Connection,
    state: Option<PackageState>,
) -> Result<Vec<PackageMetaData>> {
    let names: Vec<(String, String, String)> = if let Some(state) = state {
        let mut stmt = conn
            .prepare("SELECT name, arch, version FROM packages WHERE state = ?1")
            .map_err(db_err)?;
        stmt.query_map(params![state.as_str()], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
        })
        .map_err(db_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(db_err)?
    } else {
        let mut stmt = conn
            .prepare("SELECT name, arch, version FROM packages")
            .map_err(db_err)?;
        stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .map_err(db_err)?
            .collect::<rusqlite::Result<_>>()
            .map_err(db_err)?
    };

    names
        .into_iter()
        .map(|(name, arch, version)| {
            get_reduced_package(conn, &name, parse_arch(&arch)?, &parse_version(&version)?)?
                .ok_or_else(|| Error::DbIntegrity(format!("package {name}/{arch}/{version} vanished mid-read")))
        })
        .collect()
}

pub(crate) fn get_reduced_package(
    conn: &Connection,
    name: &str,
    arch: Architecture,
    version: &VersionNumber,
) -> Result<Option<PackageMetaData>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT source_version, state, installation_reason FROM packages
             WHERE name = ?1 AND arch = ?2 AND version = ?3",
            params![name, arch.to_string(), version.to_string()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(db_err)?;

    let Some((source_version, state, reason)) = row else {
        return Ok(None);
    };

    let pre_dependencies = get_dependency_set(conn, "pre_dependencies", name, arch, version)?;
    let dependencies = get_dependency_set(conn, "dependencies", name, arch, version)?;
    let interested_triggers = get_trigger_set(conn, "triggers_interest", name, arch, version)?;
    let activated_triggers = get_trigger_set(conn, "triggers_activate", name, arch, version)?;

    Ok(Some(PackageMetaData {
        name: name.to_string(),
        arch,
        version: version.clone(),
        source_version: parse_version(&source_version)?,
        state: state.parse()?,
        installation_reason: reason.parse()?,
        pre_dependencies,
        dependencies,
        interested_triggers,
        activated_triggers,
    }))
}

fn get_dependency_set(
    conn: &Connection,
    table: &str,
    name: &str,
    arch: Architecture,
    version: &VersionNumber,
) -> Result<Vec<Dependency>> {
    let sql = format!(
        "SELECT name, arch, constraints FROM {table}
         WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3
         ORDER BY name, arch"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let rows: Vec<(String, String, String)> = stmt
        .query_map(
            params![name, arch.to_string(), version.to_string()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .map_err(db_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(db_err)?;

    rows.into_iter()
        .map(|(dep_name, dep_arch, constraint)| {
            Ok(Dependency {
                name: dep_name,
                arch: parse_arch(&dep_arch)?,
                constraint: constraint.parse()?,
            })
        })
        .collect()
}

fn get_trigger_set(
    conn: &Connection,
    table: &str,
    name: &str,
    arch: Architecture,
    version: &VersionNumber,
) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT trigger FROM {table}
         WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3 ORDER BY trigger"
    );
    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    stmt.query_map(params![name, arch.to_string(), version.to_string()], |r| {
        r.get(0)
    })
    .map_err(db_err)?
    .collect::<rusqlite::Result<_>>()
    .map_err(db_err)
}

pub(crate) fn update_or_create_package(conn: &Connection, md: &PackageMetaData) -> Result<()> {
    conn.execute(
        "INSERT INTO packages (name, arch, version, source_version, state, installation_reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(name, arch, version) DO UPDATE SET
            source_version = excluded.source_version,
            state = excluded.state,
            installation_reason = excluded.installation_reason",
        params![
            md.name,
            md.arch.to_string(),
            md.version.to_string(),
            md.source_version.to_string(),
            md.state.as_str(),
            md.installation_reason.to_string(),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

pub(crate) fn update_state(
    conn: &Connection,
    id: &PackageIdentifier,
    version: &VersionNumber,
    state: PackageState,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE packages SET state = ?1 WHERE name = ?2 AND arch = ?3 AND version = ?4",
            params![
                state.as_str(),
                id.name,
                id.arch.to_string(),
                version.to_string()
            ],
        )
        .map_err(db_err)?;
    if changed == 0 {
        return Err(Error::DbIntegrity(format!(
            "update_state: no such package {}/{}",
            id, version
        )));
    }
    Ok(())
}

pub(crate) fn update_installation_reason(
    conn: &Connection,
    id: &PackageIdentifier,
    version: &VersionNumber,
    reason: InstallationReason,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE packages SET installation_reason = ?1
             WHERE name = ?2 AND arch = ?3 AND version = ?4",
            params![
                reason.to_string(),
                id.name,
                id.arch.to_string(),
                version.to_string()
            ],
        )
        .map_err(db_err)?;
    if changed == 0 {
        return Err(Error::DbIntegrity(format!(
            "update_installation_reason: no such package {}/{}",
            id, version
        )));
    }
    Ok(())
}

pub(crate) fn set_dependencies(conn: &Connection, md: &PackageMetaData) -> Result<()> {
    replace_dependency_set(conn, "pre_dependencies", md, &md.pre_dependencies)?;
    replace_dependency_set(conn, "dependencies", md, &md.dependencies)?;
    Ok(())
}

fn replace_dependency_set(
    conn: &Connection,
    table: &str,
    md: &PackageMetaData,
    deps: &[Dependency],
) -> Result<()> {
    conn.execute(
        &format!(
            "DELETE FROM {table} WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3"
        ),
        params![md.name, md.arch.to_string(), md.version.to_string()],
    )
    .map_err(db_err)?;
    for dep in deps {
        conn.execute(
            &format!(
                "INSERT INTO {table} (pkg_name, pkg_arch, pkg_version, name, arch, constraints)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                md.name,
                md.arch.to_string(),
                md.version.to_string(),
                dep.name,
                dep.arch.to_string(),
                dep.constraint.to_string(),
            ],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

pub(crate) fn set_files(conn: &Connection, md: &PackageMetaData, files: &[FileEntry]) -> Result<()> {
    conn.execute(
        "DELETE FROM files WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3",
        params![md.name, md.arch.to_string(), md.version.to_string()],
    )
    .map_err(db_err)?;
    for file in files {
        conn.execute(
            "INSERT INTO files (path, pkg_name, pkg_arch, pkg_version, type, uid, gid, mode, size, digest)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                file.path,
                md.name,
                md.arch.to_string(),
                md.version.to_string(),
                file_kind_to_str(file.kind),
                file.uid,
                file.gid,
                file.mode,
                file.size,
                digest_to_vec(file.sha1),
            ],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

fn row_to_file_entry(
    path: String,
    kind: String,
    uid: u32,
    gid: u32,
    mode: u16,
    size: u32,
    digest: Vec<u8>,
) -> Result<FileEntry> {
    Ok(FileEntry {
        path,
        kind: file_kind_from_str(&kind)?,
        uid,
        gid,
        mode,
        size,
        sha1: digest_from_slice(&digest)?,
    })
}

pub(crate) fn get_files(conn: &Connection, md: &PackageMetaData) -> Result<Vec<FileEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT path, type, uid, gid, mode, size, digest FROM files
             WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3 ORDER BY path",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map(
            params![md.name, md.arch.to_string(), md.version.to_string()],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, u32>(2)?,
                    r.get::<_, u32>(3)?,
                    r.get::<_, u16>(4)?,
                    r.get::<_, u32>(5)?,
                    r.get::<_, Vec<u8>>(6)?,
                ))
            },
        )
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;

    rows.into_iter()
        .map(|(path, kind, uid, gid, mode, size, digest)| {
            row_to_file_entry(path, kind, uid, gid, mode, size, digest)
        })
        .collect()
}

pub(crate) fn get_file(
    conn: &Connection,
    md: &PackageMetaData,
    path: &str,
) -> Result<Option<FileEntry>> {
    let row = conn
        .query_row(
            "SELECT path, type, uid, gid, mode, size, digest FROM files
             WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3 AND path = ?4",
            params![md.name, md.arch.to_string(), md.version.to_string(), path],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, u32>(2)?,
                    r.get::<_, u32>(3)?,
                    r.get::<_, u16>(4)?,
                    r.get::<_, u32>(5)?,
                    r.get::<_, Vec<u8>>(6)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;

    row.map(|(path, kind, uid, gid, mode, size, digest)| {
        row_to_file_entry(path, kind, uid, gid, mode, size, digest)
    })
    .transpose()
}

pub(crate) fn set_config_files(
    conn: &Connection,
    md: &PackageMetaData,
    paths: &[String],
) -> Result<()> {
    conn.execute(
        "DELETE FROM config_files WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3",
        params![md.name, md.arch.to_string(), md.version.to_string()],
    )
    .map_err(db_err)?;
    for path in paths {
        conn.execute(
            "INSERT INTO config_files (path, pkg_name, pkg_arch, pkg_version) VALUES (?1, ?2, ?3, ?4)",
            params![path, md.name, md.arch.to_string(), md.version.to_string()],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

pub(crate) fn get_config_files(conn: &Connection, md: &PackageMetaData) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT path FROM config_files
             WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3 ORDER BY path ASC",
        )
        .map_err(db_err)?;
    stmt.query_map(
        params![md.name, md.arch.to_string(), md.version.to_string()],
        |r| r.get(0),
    )
    .map_err(db_err)?
    .collect::<rusqlite::Result<_>>()
    .map_err(db_err)
}

pub(crate) fn get_all_files_plain(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT path FROM files ORDER BY path ASC")
        .map_err(db_err)?;
    stmt.query_map([], |r| r.get(0))
        .map_err(db_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(db_err)
}

/// Every package that currently owns `path`, used by `ll_rm_files` to tell
/// whether a file is still claimed by some other package before deleting
/// it (spec §4.6).
pub(crate) fn find_owners_of_file(conn: &Connection, path: &str) -> Result<Vec<PackageIdentifier>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT pkg_name, pkg_arch FROM files WHERE path = ?1")
        .map_err(db_err)?;
    let rows = stmt
        .query_map(params![path], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;
    rows.into_iter()
        .map(|(name, arch)| Ok(PackageIdentifier { name, arch: parse_arch(&arch)? }))
        .collect()
}

pub(crate) fn set_interested_triggers(
    conn: &Connection,
    md: &PackageMetaData,
    triggers: &[String],
) -> Result<()> {
    replace_trigger_set(conn, "triggers_interest", md, triggers)
}

pub(crate) fn set_activating_triggers(
    conn: &Connection,
    md: &PackageMetaData,
    triggers: &[String],
) -> Result<()> {
    replace_trigger_set(conn, "triggers_activate", md, triggers)
}

fn replace_trigger_set(
    conn: &Connection,
    table: &str,
    md: &PackageMetaData,
    triggers: &[String],
) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {table} WHERE pkg_name = ?1 AND pkg_arch = ?2 AND pkg_version = ?3"),
        params![md.name, md.arch.to_string(), md.version.to_string()],
    )
    .map_err(db_err)?;
    for trigger in triggers {
        conn.execute(
            &format!(
                "INSERT INTO {table} (pkg_name, pkg_arch, pkg_version, trigger) VALUES (?1, ?2, ?3, ?4)"
            ),
            params![md.name, md.arch.to_string(), md.version.to_string(), trigger],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

pub(crate) fn delete_package(conn: &Connection, md: &PackageMetaData) -> Result<()> {
    conn.execute(
        "DELETE FROM packages WHERE name = ?1 AND arch = ?2 AND version = ?3",
        params![md.name, md.arch.to_string(), md.version.to_string()],
    )
    .map_err(db_err)?;
    Ok(())
}

/// Lazily loads `triggers_activate` for `md` if its in-memory copy is empty.
/// The database itself holds no cache, so this simply re-reads when asked.
pub(crate) fn ensure_activating_triggers_read(
    conn: &Connection,
    md: &mut PackageMetaData,
) -> Result<()> {
    if md.activated_triggers.is_empty() {
        md.activated_triggers = get_trigger_set(conn, "triggers_activate", &md.name, md.arch, &md.version)?;
    }
    Ok(())
}

pub(crate) fn activate_trigger(conn: &Connection, trigger: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO triggers_activated (trigger) VALUES (?1)",
        params![trigger],
    )
    .map_err(db_err)?;
    Ok(())
}

pub(crate) fn get_activated_triggers(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT trigger FROM triggers_activated ORDER BY trigger")
        .map_err(db_err)?;
    stmt.query_map([], |r| r.get(0))
        .map_err(db_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(db_err)
}

pub(crate) fn find_packages_interested_in_trigger(
    conn: &Connection,
    trigger: &str,
) -> Result<Vec<PackageIdentifier>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT pkg_name, pkg_arch FROM triggers_interest WHERE trigger = ?1
             ORDER BY pkg_name, pkg_arch",
        )
        .map_err(db_err)?;
    let rows: Vec<(String, String)> = stmt
        .query_map(params![trigger], |r| Ok((r.get(0)?, r.get(1)?)))
        .map_err(db_err)?
        .collect::<rusqlite::Result<_>>()
        .map_err(db_err)?;

    rows.into_iter()
        .map(|(name, arch)| Ok(PackageIdentifier { name, arch: parse_arch(&arch)? }))
        .collect()
}

pub(crate) fn clear_trigger(conn: &Connection, trigger: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM triggers_activated WHERE trigger = ?1",
        params![trigger],
    )
    .map_err(db_err)?;
    Ok(())
}
