//! Schema creation and the pinned schema version check.

use rusqlite::Connection;
use tpm_core::Error;

/// The only schema version this crate understands. A database carrying any
/// other value in `schema_version` is a fatal error — no migration path is
/// specified.
pub const SCHEMA_VERSION: &str = "1.2";

pub(crate) fn ensure_schema(conn: &Connection) -> Result<(), Error> {
    let existing: Option<String> = conn
        .query_row("SELECT version FROM schema_version", [], |r| r.get(0))
        .ok();

    match existing {
        None => {
            let tables: u32 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='packages'",
                    [],
                    |r| r.get(0),
                )
                .map_err(|e| Error::DbEngine(e.to_string()))?;
            if tables > 0 {
                return Err(Error::DbIntegrity(
                    "database has tables but no schema_version row".into(),
                ));
            }
            create_schema(conn)?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            return Err(Error::DbIntegrity(format!(
                "unsupported schema version '{version}', expected '{SCHEMA_VERSION}'"
            )));
        }
    }
    Ok(())
}

fn create_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "
        CREATE TABLE packages (
            name TEXT NOT NULL,
            arch TEXT NOT NULL,
            version TEXT NOT NULL,
            source_version TEXT NOT NULL,
            state TEXT NOT NULL,
            installation_reason TEXT NOT NULL,
            PRIMARY KEY (name, arch, version)
        );

        CREATE TABLE files (
            path TEXT NOT NULL,
            pkg_name TEXT NOT NULL,
            pkg_arch TEXT NOT NULL,
            pkg_version TEXT NOT NULL,
            type TEXT NOT NULL,
            uid INTEGER NOT NULL,
            gid INTEGER NOT NULL,
            mode INTEGER NOT NULL,
            size INTEGER NOT NULL,
            digest BLOB NOT NULL,
            PRIMARY KEY (path, pkg_name, pkg_arch, pkg_version),
            FOREIGN KEY (pkg_name, pkg_arch, pkg_version)
                REFERENCES packages(name, arch, version) ON DELETE CASCADE
        );
        CREATE INDEX idx_files_path ON files(path);

        CREATE TABLE config_files (
            path TEXT NOT NULL,
            pkg_name TEXT NOT NULL,
            pkg_arch TEXT NOT NULL,
            pkg_version TEXT NOT NULL,
            PRIMARY KEY (path, pkg_name, pkg_arch, pkg_version),
            FOREIGN KEY (pkg_name, pkg_arch, pkg_version)
                REFERENCES packages(name, arch, version) ON DELETE CASCADE
        );

        CREATE TABLE pre_dependencies (
            pkg_name TEXT NOT NULL,
            pkg_arch TEXT NOT NULL,
            pkg_version TEXT NOT NULL,
            name TEXT NOT NULL,
            arch TEXT NOT NULL,
            constraints TEXT NOT NULL,
            PRIMARY KEY (pkg_name, pkg_arch, pkg_version, name, arch),
            FOREIGN KEY (pkg_name, pkg_arch, pkg_version)
                REFERENCES packages(name, arch, version) ON DELETE CASCADE
        );

        CREATE TABLE dependencies (
            pkg_name TEXT NOT NULL,
            pkg_arch TEXT NOT NULL,
            pkg_version TEXT NOT NULL,
            name TEXT NOT NULL,
            arch TEXT NOT NULL,
            constraints TEXT NOT NULL,
            PRIMARY KEY (pkg_name, pkg_arch, pkg_version, name, arch),
            FOREIGN KEY (pkg_name, pkg_arch, pkg_version)
                REFERENCES packages(name, arch, version) ON DELETE CASCADE
        );

        CREATE TABLE triggers_interest (
            pkg_name TEXT NOT NULL,
            pkg_arch TEXT NOT NULL,
            pkg_version TEXT NOT NULL,
            trigger TEXT NOT NULL,
            PRIMARY KEY (pkg_name, pkg_arch, pkg_version, trigger),
            FOREIGN KEY (pkg_name, pkg_arch, pkg_version)
                REFERENCES packages(name, arch, version) ON DELETE CASCADE
        );
        CREATE INDEX idx_triggers_interest_trigger ON triggers_interest(trigger);

        CREATE TABLE triggers_activate (
            pkg_name TEXT NOT NULL,
            pkg_arch TEXT NOT NULL,
            pkg_version TEXT NOT NULL,
            trigger TEXT NOT NULL,
            PRIMARY KEY (pkg_name, pkg_arch, pkg_version, trigger),
            FOREIGN KEY (pkg_name, pkg_arch, pkg_version)
                REFERENCES packages(name, arch, version) ON DELETE CASCADE
        );

        CREATE TABLE triggers_activated (
            trigger TEXT PRIMARY KEY
        );

        CREATE TABLE schema_version (
            version TEXT PRIMARY KEY
        );
        ",
    )
    .map_err(|e| Error::DbEngine(e.to_string()))?;

    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )
    .map_err(|e| Error::DbEngine(e.to_string()))?;
    Ok(())
}
