//! The package database (spec §4.3): a `rusqlite`-backed relational store
//! tracking every installed package, its files, config files, dependency
//! edges, and trigger bookkeeping.
//!
//! Every public operation is one logical transaction unless the caller
//! explicitly groups several together with [`PackageDb::begin`]. A missing
//! database is created fresh with the current schema; any other stored
//! schema version is a fatal [`tpm_core::Error::DbIntegrity`].

mod queries;
mod schema;

use std::ops::Deref;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tpm_core::{
    Architecture, Error, FileEntry, InstallationReason, PackageIdentifier, PackageMetaData,
    PackageState, Result, VersionNumber,
};

pub use schema::SCHEMA_VERSION;

/// Database operations, generic over whether they run on a bare connection
/// or inside an open transaction. [`PackageDb`] and [`Transaction`] are both
/// instantiations of this type so every operation is written exactly once.
#[derive(Debug)]
pub struct Db<C> {
    conn: C,
}

impl<C> Db<C>
where
    C: Deref<Target = Connection>,
{
    pub fn get_packages_in_state(&self, state: Option<PackageState>) -> Result<Vec<PackageMetaData>> {
        queries::get_packages_in_state(&self.conn, state)
    }

    pub fn get_reduced_package(
        &self,
        name: &str,
        arch: Architecture,
        version: &VersionNumber,
    ) -> Result<Option<PackageMetaData>> {
        queries::get_reduced_package(&self.conn, name, arch, version)
    }

    pub fn update_or_create_package(&self, md: &PackageMetaData) -> Result<()> {
        queries::update_or_create_package(&self.conn, md)
    }

    pub fn update_state(
        &self,
        id: &PackageIdentifier,
        version: &VersionNumber,
        state: PackageState,
    ) -> Result<()> {
        queries::update_state(&self.conn, id, version, state)
    }

    pub fn update_installation_reason(
        &self,
        id: &PackageIdentifier,
        version: &VersionNumber,
        reason: InstallationReason,
    ) -> Result<()> {
        queries::update_installation_reason(&self.conn, id, version, reason)
    }

    pub fn set_dependencies(&self, md: &PackageMetaData) -> Result<()> {
        queries::set_dependencies(&self.conn, md)
    }

    pub fn set_files(&self, md: &PackageMetaData, files: &[FileEntry]) -> Result<()> {
        queries::set_files(&self.conn, md, files)
    }

    pub fn get_files(&self, md: &PackageMetaData) -> Result<Vec<FileEntry>> {
        queries::get_files(&self.conn, md)
    }

    pub fn get_file(&self, md: &PackageMetaData, path: &str) -> Result<Option<FileEntry>> {
        queries::get_file(&self.conn, md, path)
    }

    pub fn set_config_files(&self, md: &PackageMetaData, paths: &[String]) -> Result<()> {
        queries::set_config_files(&self.conn, md, paths)
    }

    pub fn get_config_files(&self, md: &PackageMetaData) -> Result<Vec<String>> {
        queries::get_config_files(&self.conn, md)
    }

    pub fn get_all_files_plain(&self) -> Result<Vec<String>> {
        queries::get_all_files_plain(&self.conn)
    }

    pub fn find_owners_of_file(&self, path: &str) -> Result<Vec<PackageIdentifier>> {
        queries::find_owners_of_file(&self.conn, path)
    }

    pub fn set_interested_triggers(&self, md: &PackageMetaData, triggers: &[String]) -> Result<()> {
        queries::set_interested_triggers(&self.conn, md, triggers)
    }

    pub fn set_activating_triggers(&self, md: &PackageMetaData, triggers: &[String]) -> Result<()> {
        queries::set_activating_triggers(&self.conn, md, triggers)
    }

    pub fn delete_package(&self, md: &PackageMetaData) -> Result<()> {
        queries::delete_package(&self.conn, md)
    }

    pub fn ensure_activating_triggers_read(&self, md: &mut PackageMetaData) -> Result<()> {
        queries::ensure_activating_triggers_read(&self.conn, md)
    }

    pub fn activate_trigger(&self, trigger: &str) -> Result<()> {
        queries::activate_trigger(&self.conn, trigger)
    }

    pub fn get_activated_triggers(&self) -> Result<Vec<String>> {
        queries::get_activated_triggers(&self.conn)
    }

    pub fn find_packages_interested_in_trigger(&self, trigger: &str) -> Result<Vec<PackageIdentifier>> {
        queries::find_packages_interested_in_trigger(&self.conn, trigger)
    }

    pub fn clear_trigger(&self, trigger: &str) -> Result<()> {
        queries::clear_trigger(&self.conn, trigger)
    }
}

/// The package database handle, owning its connection.
pub type PackageDb = Db<Connection>;

impl Db<Connection> {
    /// Opens (creating if necessary) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(|e| Error::CannotOpenDb {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::CannotOpenDb {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        schema::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory database, used by tests and dry-run comparisons.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::CannotOpenDb {
            path: PathBuf::from(":memory:"),
            message: e.to_string(),
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::DbEngine(e.to_string()))?;
        schema::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an explicit transaction grouping several operations into one
    /// commit point, e.g. `ll_run_preinst`'s package row, dependency rows,
    /// file list, config-file list, and trigger-interest rows.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        let tx = self.conn.transaction().map_err(|e| Error::DbEngine(e.to_string()))?;
        Ok(Transaction { conn: tx })
    }
}

/// A grouped set of operations committed together. Dropping without calling
/// [`Transaction::commit`] rolls back, matching `rusqlite`'s own behavior.
pub type Transaction<'conn> = Db<rusqlite::Transaction<'conn>>;

impl Transaction<'_> {
    /// Commits every operation performed through this handle.
    pub fn commit(self) -> Result<()> {
        self.conn.commit().map_err(|e| Error::DbEngine(e.to_string()))
    }

    /// Rolls back every operation performed through this handle.
    pub fn rollback(self) -> Result<()> {
        self.conn.rollback().map_err(|e| Error::DbEngine(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_core::{Dependency, FileKind};

    fn sample_md() -> PackageMetaData {
        PackageMetaData {
            name: "foo".into(),
            arch: Architecture::Amd64,
            version: VersionNumber::parse("1.0").unwrap(),
            source_version: VersionNumber::parse("1.0").unwrap(),
            state: PackageState::Wanted,
            installation_reason: InstallationReason::Manual,
            pre_dependencies: vec![],
            dependencies: vec![Dependency {
                name: "libc".into(),
                arch: Architecture::Amd64,
                constraint: "(>=b:1.0)".parse().unwrap(),
            }],
            interested_triggers: vec!["ldconfig".into()],
            activated_triggers: vec![],
        }
    }

    #[test]
    fn fresh_database_creates_schema_1_2() {
        let db = PackageDb::open_in_memory().unwrap();
        assert_eq!(
            db.conn
                .query_row("SELECT version FROM schema_version", [], |r| r.get::<_, String>(0))
                .unwrap(),
            "1.2"
        );
    }

    #[test]
    fn reopening_the_same_schema_version_succeeds() {
        let db = PackageDb::open_in_memory().unwrap();
        schema::ensure_schema(&db.conn).unwrap();
    }

    #[test]
    fn create_then_read_round_trips_metadata() {
        let db = PackageDb::open_in_memory().unwrap();
        let md = sample_md();
        db.update_or_create_package(&md).unwrap();
        db.set_dependencies(&md).unwrap();
        db.set_interested_triggers(&md, &md.interested_triggers).unwrap();

        let read = db
            .get_reduced_package("foo", Architecture::Amd64, &md.version)
            .unwrap()
            .unwrap();
        assert_eq!(read.dependencies, md.dependencies);
        assert_eq!(read.interested_triggers, md.interested_triggers);
    }

    #[test]
    fn grouped_transaction_commits_atomically() {
        let mut db = PackageDb::open_in_memory().unwrap();
        let md = sample_md();
        {
            let tx = db.begin().unwrap();
            tx.update_or_create_package(&md).unwrap();
            tx.set_dependencies(&md).unwrap();
            tx.commit().unwrap();
        }
        assert!(db
            .get_reduced_package("foo", Architecture::Amd64, &md.version)
            .unwrap()
            .is_some());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut db = PackageDb::open_in_memory().unwrap();
        let md = sample_md();
        {
            let tx = db.begin().unwrap();
            tx.update_or_create_package(&md).unwrap();
            // tx dropped here without commit
        }
        assert!(db
            .get_reduced_package("foo", Architecture::Amd64, &md.version)
            .unwrap()
            .is_none());
    }

    #[test]
    fn deleting_a_package_cascades_its_satellite_rows() {
        let db = PackageDb::open_in_memory().unwrap();
        let md = sample_md();
        db.update_or_create_package(&md).unwrap();
        db.set_dependencies(&md).unwrap();
        db.set_files(
            &md,
            &[FileEntry {
                path: "/usr/bin/foo".into(),
                kind: FileKind::Regular,
                uid: 0,
                gid: 0,
                mode: 0o755,
                size: 4096,
                sha1: [0u8; 20],
            }],
        )
        .unwrap();

        db.delete_package(&md).unwrap();

        assert!(db
            .get_reduced_package("foo", Architecture::Amd64, &md.version)
            .unwrap()
            .is_none());
        assert!(db.get_all_files_plain().unwrap().is_empty());
    }

    #[test]
    fn activate_trigger_is_insert_or_ignore() {
        let db = PackageDb::open_in_memory().unwrap();
        db.activate_trigger("ldconfig").unwrap();
        db.activate_trigger("ldconfig").unwrap();
        assert_eq!(db.get_activated_triggers().unwrap(), vec!["ldconfig"]);
        db.clear_trigger("ldconfig").unwrap();
        assert!(db.get_activated_triggers().unwrap().is_empty());
    }
}
