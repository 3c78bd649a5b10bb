//! One module per CLI operation (spec §6). [`Cli`] defines the flat,
//! mutually-exclusive operation surface; [`Session`] is the bundle of
//! open handles every operation needs.

mod create_index;
mod graph;
mod helpers;
mod mark;
mod query;
mod transaction;

use std::path::{Path, PathBuf};

use clap::{ArgGroup, Parser};
use tpm_core::Result;
use tpm_db::PackageDb;
use tpm_provider::Provider;

use crate::config;

#[derive(Debug, Parser)]
#[command(
    name = "tpm2",
    about = "Source-based package manager: dependency resolution, install/removal orchestration, and a transactional package database",
    group(ArgGroup::new("operation").required(true).args([
        "install", "upgrade", "remove", "remove_unneeded", "removal_graph", "installation_graph",
        "list_installed", "list_available", "show_version", "show_problems",
        "reverse_dependencies", "mark_manual", "mark_auto", "compare_system", "create_index",
    ]))
)]
pub struct Cli {
    /// Install the named packages (`name` or `name/arch`).
    #[arg(long, num_args = 1..)]
    pub install: Vec<String>,

    /// Upgrade the named packages, or every installed package if none given.
    #[arg(long, num_args = 0.., value_name = "PACKAGE")]
    pub upgrade: Option<Vec<String>>,

    /// Remove the named packages.
    #[arg(long, num_args = 1..)]
    pub remove: Vec<String>,

    /// Remove every automatically-installed package no longer depended on.
    #[arg(long)]
    pub remove_unneeded: bool,

    /// Print the removal graph for the named packages without acting on it.
    #[arg(long, num_args = 1..)]
    pub removal_graph: Vec<String>,

    /// Print the installation graph that installing the named packages
    /// would produce, without acting on it.
    #[arg(long, num_args = 1..)]
    pub installation_graph: Vec<String>,

    /// List every installed package.
    #[arg(long)]
    pub list_installed: bool,

    /// List every package offered by a configured repository.
    #[arg(long)]
    pub list_available: bool,

    /// Print the installed version of the named package.
    #[arg(long, value_name = "PACKAGE")]
    pub show_version: Option<String>,

    /// Report packages with unsatisfied dependencies or broken state.
    #[arg(long)]
    pub show_problems: bool,

    /// List every package that depends on the named package.
    #[arg(long, value_name = "PACKAGE")]
    pub reverse_dependencies: Option<String>,

    /// Mark the named packages as manually installed.
    #[arg(long, num_args = 1..)]
    pub mark_manual: Vec<String>,

    /// Mark the named packages as automatically installed.
    #[arg(long, num_args = 1..)]
    pub mark_auto: Vec<String>,

    /// Compare the installed set against what a fresh solve would choose.
    #[arg(long)]
    pub compare_system: bool,

    /// Build a repository index out of the `.tpm2` files in `<dir>`.
    #[arg(long, num_args = 1..=2, value_names = ["DIR", "NAME"])]
    pub create_index: Vec<String>,

    /// Root directory to operate under. Defaults to `$TPM_TARGET`, or `/`.
    #[arg(long, value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Emit a log line for every orchestrator step.
    #[arg(long)]
    pub verbose: bool,

    /// Answer every confirmation prompt affirmatively.
    #[arg(long)]
    pub assume_yes: bool,

    /// Adopt pre-existing, non-package-owned files without prompting.
    #[arg(long)]
    pub adopt_all: bool,

    /// Require and verify a repository index signature against this key name.
    #[arg(long, value_name = "KEYNAME")]
    pub sign: Option<String>,
}

impl Cli {
    /// Resolves the target root: `--target`, else `$TPM_TARGET`, else `/`.
    #[must_use]
    pub fn resolve_target(&self) -> PathBuf {
        self.target
            .clone()
            .or_else(|| std::env::var_os("TPM_TARGET").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

/// The open handles every operation shares: the database, the provider, and
/// the resolved target root.
pub struct Session {
    pub db: PackageDb,
    pub provider: Provider,
    pub target: PathBuf,
}

impl Session {
    pub fn open(target: &Path) -> Result<Self> {
        let db = PackageDb::open_at(&target.join("var/lib/tpm/status.db"))?;
        let provider = config::build_provider(target)?;
        Ok(Self { db, provider, target: target.to_path_buf() })
    }
}

pub use create_index::run as create_index;
pub use graph::{run_installation_graph, run_removal_graph};
pub use mark::{run_mark_auto, run_mark_manual};
pub use query::{
    run_compare_system, run_list_available, run_list_installed, run_reverse_dependencies,
    run_show_problems, run_show_version,
};
pub use transaction::{run_install, run_remove, run_remove_unneeded, run_upgrade};
