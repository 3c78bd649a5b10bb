//! The error type shared across tpm2rs.
//!
//! Error kinds follow spec §7 exactly: parse errors in external data (a
//! single repository index, a single `desc.xml`) are caught by the caller
//! and that source is skipped — they never reach this enum as a fatal
//! variant. Everything here is either fatal for the in-flight operation or
//! reported and degraded in a way the orchestrator controls explicitly.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of signature failure encountered while verifying a repository
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureErrorKind {
    /// The signature did not verify against the configured public key.
    AuthenticationFailed,
    /// The index required a signature but carried none.
    AuthenticationFailedNoSignature,
    /// The index declared a `tpm_repo_index` version this build cannot read.
    UnsupportedIndexVersion,
}

impl std::fmt::Display for SignatureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthenticationFailed => "authentication failed",
            Self::AuthenticationFailedNoSignature => "authentication failed: no signature present",
            Self::UnsupportedIndexVersion => "unsupported index version",
        };
        write!(f, "{s}")
    }
}

/// Unified error type for tpm2rs.
#[derive(Debug, Error)]
pub enum Error {
    /// A `VersionNumber`, `Formula`, or XML document failed to parse.
    #[error("parse error in {context}: {message}")]
    Parse {
        /// What was being parsed (e.g. "version string '1.0.a'").
        context: String,
        /// Human-readable detail.
        message: String,
    },

    /// An architecture string did not name a known, non-reserved value.
    #[error("invalid architecture: {name}")]
    InvalidArchitecture {
        /// The offending string.
        name: String,
    },

    /// The package database's invariants were violated (not an engine
    /// fault — e.g. a selected package marked for removal).
    #[error("package database integrity error: {0}")]
    DbIntegrity(String),

    /// The underlying SQLite engine reported a fault.
    #[error("package database engine error: {0}")]
    DbEngine(String),

    /// The database file could not be opened or created.
    #[error("cannot open package database at {path}: {message}")]
    CannotOpenDb {
        /// Path to the database file.
        path: PathBuf,
        /// Underlying message.
        message: String,
    },

    /// A filesystem operation failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The external `tar` subprocess exited non-zero, or its pipe closed
    /// unexpectedly.
    #[error("archive error: {0}")]
    Archive(String),

    /// Repository index signature verification failed.
    #[error("signature error: {kind}")]
    Signature {
        /// Which kind of signature failure occurred.
        kind: SignatureErrorKind,
    },

    /// The dependency solver could not produce a graph.
    #[error("solver error: {0}")]
    Solver(String),

    /// A low-level orchestrator step was invoked while the persisted state
    /// did not permit it.
    #[error(
        "state machine violation: package {name}/{arch} is in state {actual}, step requires {expected}"
    )]
    StateMachineViolation {
        /// Package name.
        name: String,
        /// Package architecture.
        arch: String,
        /// The state the package was actually found in.
        actual: String,
        /// The state (or states) the step required.
        expected: String,
    },

    /// The user declined a confirmation prompt (e.g. adoption without
    /// `--adopt-all`).
    #[error("aborted by user")]
    UserAbort,
}

impl Error {
    /// Maps this error onto the CLI exit-code space from spec §6:
    /// `1` operational failure, `3` unexpected internal error. Argument
    /// errors (`2`) are produced by `clap` before any `Error` exists.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::UserAbort => 1,
            Self::Parse { .. }
            | Self::InvalidArchitecture { .. }
            | Self::Archive(_)
            | Self::Signature { .. }
            | Self::Solver(_) => 1,
            Self::DbIntegrity(_)
            | Self::DbEngine(_)
            | Self::CannotOpenDb { .. }
            | Self::Io { .. }
            | Self::StateMachineViolation { .. } => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_abort_exits_one() {
        assert_eq!(Error::UserAbort.exit_code(), 1);
    }

    #[test]
    fn db_integrity_is_an_internal_error() {
        let err = Error::DbIntegrity("orphan file row".into());
        assert_eq!(err.exit_code(), 3);
    }
}
