//! Core types shared across tpm2rs: version/constraint algebra, the
//! architecture enum, and the crate-wide error type.
//!
//! Every other crate in the workspace depends on this one; nothing in here
//! depends on the database, the transport-form codec, or the solver.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod architecture;
pub mod error;
pub mod metadata;
pub mod state;
pub mod version;

pub use architecture::Architecture;
pub use error::{Error, Result};
pub use metadata::{Dependency, FileEntry, FileKind, PackageIdentifier, PackageMetaData};
pub use state::{InstallationReason, PackageState};
pub use version::{Constraint, ConstraintOp, ConstraintTarget, Formula, VersionNumber};

// Re-exported so downstream crates share one hasher/lock implementation
// instead of pulling their own copies in.
pub use ahash::{AHashMap, AHashSet};
pub use parking_lot::{Mutex, RwLock};

/// Global allocator, matching every other binary in this workspace.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
