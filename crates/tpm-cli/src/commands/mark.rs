//! `--mark-manual` / `--mark-auto`: flips a package's installation reason
//! in place without touching its persisted state.

use tpm_core::{InstallationReason, Result};

use super::Session;
use super::helpers::find_installed;
use crate::output;

fn mark(session: &mut Session, names: &[String], reason: InstallationReason) -> Result<()> {
    for arg in names {
        let md = find_installed(&session.db, arg)?;
        session.db.update_installation_reason(&md.identifier(), &md.version, reason)?;
        output::success(&format!("marked {}/{} as {reason}", md.name, md.arch));
    }
    Ok(())
}

pub fn run_mark_manual(session: &mut Session, names: &[String]) -> Result<()> {
    mark(session, names, InstallationReason::Manual)
}

pub fn run_mark_auto(session: &mut Session, names: &[String]) -> Result<()> {
    mark(session, names, InstallationReason::Auto)
}
