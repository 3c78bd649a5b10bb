//! The provider layer (spec §4.4): enumerates package versions across an
//! ordered list of repositories and exposes lazy access to each package's
//! sections.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod directory_repository;
mod provided_package;
mod provider;
mod repository;

pub use directory_repository::DirectoryRepository;
pub use provided_package::ProvidedPackage;
pub use provider::Provider;
pub use repository::Repository;
