//! The persisted package state machine (spec §4/§5).
//!
//! A package moves through these states strictly via the orchestrator's
//! low-level steps; the database stores exactly one state per
//! `(name, arch, version)` tuple and every advance is its own commit point.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Whether a package was requested directly by the user or pulled in only
/// to satisfy a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallationReason {
    /// Installed on explicit user request; survives `--remove-unneeded`.
    Manual,
    /// Installed only to satisfy another package; eligible for automatic
    /// removal once nothing depends on it anymore.
    Auto,
}

impl fmt::Display for InstallationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        })
    }
}

impl FromStr for InstallationReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            other => Err(Error::Parse {
                context: "installation reason".into(),
                message: format!("unknown reason '{other}'"),
            }),
        }
    }
}

/// The persisted state of an installed or in-progress package.
///
/// The *begin* arc is used for a fresh install or an outright removal; the
/// *change* arc is used when a package is being replaced by a different
/// version within the same operation. A package is never observed in two
/// post-change states at once — `WaitNewUnpacked` and `WaitOldRemoved` are
/// the sole rendezvous points of the change handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageState {
    /// Transient placeholder used only while parsing; never persisted.
    Invalid,
    Wanted,
    PreinstBegin,
    UnpackBegin,
    ConfigureBegin,
    Configured,
    UnconfigureBegin,
    RmFilesBegin,
    PostrmBegin,
    PreinstChange,
    UnpackChange,
    WaitOldRemoved,
    ConfigureChange,
    UnconfigureChange,
    WaitNewUnpacked,
    RmFilesChange,
    PostrmChange,
}

impl PackageState {
    /// Whether this state belongs to the *change* arc rather than *begin*.
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(
            self,
            Self::PreinstChange
                | Self::UnpackChange
                | Self::WaitOldRemoved
                | Self::ConfigureChange
                | Self::UnconfigureChange
                | Self::WaitNewUnpacked
                | Self::RmFilesChange
                | Self::PostrmChange
        )
    }

    /// The name used for this state both in the database and in CLI
    /// diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Wanted => "wanted",
            Self::PreinstBegin => "preinst_begin",
            Self::UnpackBegin => "unpack_begin",
            Self::ConfigureBegin => "configure_begin",
            Self::Configured => "configured",
            Self::UnconfigureBegin => "unconfigure_begin",
            Self::RmFilesBegin => "rm_files_begin",
            Self::PostrmBegin => "postrm_begin",
            Self::PreinstChange => "preinst_change",
            Self::UnpackChange => "unpack_change",
            Self::WaitOldRemoved => "wait_old_removed",
            Self::ConfigureChange => "configure_change",
            Self::UnconfigureChange => "unconfigure_change",
            Self::WaitNewUnpacked => "wait_new_unpacked",
            Self::RmFilesChange => "rm_files_change",
            Self::PostrmChange => "postrm_change",
        }
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "invalid" => Self::Invalid,
            "wanted" => Self::Wanted,
            "preinst_begin" => Self::PreinstBegin,
            "unpack_begin" => Self::UnpackBegin,
            "configure_begin" => Self::ConfigureBegin,
            "configured" => Self::Configured,
            "unconfigure_begin" => Self::UnconfigureBegin,
            "rm_files_begin" => Self::RmFilesBegin,
            "postrm_begin" => Self::PostrmBegin,
            "preinst_change" => Self::PreinstChange,
            "unpack_change" => Self::UnpackChange,
            "wait_old_removed" => Self::WaitOldRemoved,
            "configure_change" => Self::ConfigureChange,
            "unconfigure_change" => Self::UnconfigureChange,
            "wait_new_unpacked" => Self::WaitNewUnpacked,
            "rm_files_change" => Self::RmFilesChange,
            "postrm_change" => Self::PostrmChange,
            other => {
                return Err(Error::DbIntegrity(format!(
                    "unknown persisted package state '{other}'"
                )));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_its_string_form() {
        for state in [
            PackageState::Wanted,
            PackageState::Configured,
            PackageState::WaitNewUnpacked,
            PackageState::PostrmChange,
        ] {
            let parsed: PackageState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn change_states_are_classified_correctly() {
        assert!(PackageState::PreinstChange.is_change());
        assert!(!PackageState::PreinstBegin.is_change());
    }

    #[test]
    fn unknown_state_string_is_a_db_integrity_error() {
        assert!(matches!(
            "bogus".parse::<PackageState>(),
            Err(Error::DbIntegrity(_))
        ));
    }
}
