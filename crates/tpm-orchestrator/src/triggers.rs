//! Deferred trigger execution (spec §4.6). A package's `unconfigure` or
//! `configure` can activate a named trigger; every package that declared
//! interest in it is re-configured once, after the whole operation graph
//! has otherwise settled.

use tpm_transport::SectionType;
use tpm_core::{PackageState, Result};
use tpm_db::PackageDb;
use tracing::{info, warn};

use crate::scripts;
use std::path::Path;

/// Drains every activated trigger, running `configure <trigger-name>` on
/// each interested package currently sitting in `configured`. A package
/// mid-install or mid-removal is left alone; it will see the trigger again
/// if reactivated later.
pub fn execute_triggers(db: &PackageDb, target: &Path) -> Result<()> {
    let configured = db.get_packages_in_state(Some(PackageState::Configured))?;

    for trigger in db.get_activated_triggers()? {
        let interested = db.find_packages_interested_in_trigger(&trigger)?;
        for id in interested {
            let Some(md) = configured.iter().find(|md| md.name == id.name && md.arch == id.arch) else {
                warn!(name = %id.name, arch = %id.arch, %trigger, "skipping trigger for package not in configured state");
                continue;
            };
            scripts::run(target, &id.name, id.arch, &md.version, SectionType::Configure, &["triggered", &trigger])?;
            info!(name = %id.name, arch = %id.arch, %trigger, "ran trigger");
        }
        db.clear_trigger(&trigger)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_core::{Architecture, Dependency, InstallationReason, PackageMetaData, VersionNumber};

    fn sample_md(name: &str) -> PackageMetaData {
        PackageMetaData {
            name: name.into(),
            arch: Architecture::Amd64,
            version: VersionNumber::parse("1.0").unwrap(),
            source_version: VersionNumber::parse("1.0").unwrap(),
            state: PackageState::Configured,
            installation_reason: InstallationReason::Manual,
            pre_dependencies: vec![],
            dependencies: Vec::<Dependency>::new(),
            interested_triggers: vec!["ldconfig".into()],
            activated_triggers: vec![],
        }
    }

    #[test]
    fn a_trigger_with_no_interested_packages_is_just_cleared() {
        let db = PackageDb::open_in_memory().unwrap();
        db.activate_trigger("ldconfig").unwrap();
        let dir = tempfile::tempdir().unwrap();

        execute_triggers(&db, dir.path()).unwrap();

        assert!(db.get_activated_triggers().unwrap().is_empty());
    }

    #[test]
    fn an_interested_package_not_configured_is_skipped_without_error() {
        let db = PackageDb::open_in_memory().unwrap();
        let mut md = sample_md("foo");
        md.state = PackageState::UnpackBegin;
        db.update_or_create_package(&md).unwrap();
        db.set_interested_triggers(&md, &md.interested_triggers).unwrap();
        db.activate_trigger("ldconfig").unwrap();
        let dir = tempfile::tempdir().unwrap();

        execute_triggers(&db, dir.path()).unwrap();

        assert!(db.get_activated_triggers().unwrap().is_empty());
    }
}
