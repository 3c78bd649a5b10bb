//! End-to-end CLI tests driving the `tpm2` binary against a throwaway
//! target tree.

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn tpm2() -> Command {
    Command::new(cargo_bin!("tpm2"))
}

fn empty_target() -> TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn help_lists_the_operation_flags() {
    tpm2()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--install"))
        .stdout(predicate::str::contains("--remove"))
        .stdout(predicate::str::contains("--create-index"));
}

#[test]
fn no_operation_flag_is_a_clap_usage_error() {
    tpm2().assert().failure().code(2);
}

#[test]
fn two_operation_flags_at_once_is_a_clap_usage_error() {
    tpm2()
        .args(["--list-installed", "--list-available"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn list_installed_on_a_fresh_target_reports_nothing() {
    let target = empty_target();
    tpm2()
        .args(["--target", target.path().to_str().unwrap(), "--list-installed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no packages installed"));
}

#[test]
fn show_version_of_an_unknown_package_is_an_operational_error() {
    let target = empty_target();
    tpm2()
        .args(["--target", target.path().to_str().unwrap(), "--show-version", "nonexistent"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn show_problems_on_a_fresh_target_finds_none() {
    let target = empty_target();
    tpm2()
        .args(["--target", target.path().to_str().unwrap(), "--show-problems"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no problems found"));
}

#[test]
fn compare_system_on_a_fresh_target_matches() {
    let target = empty_target();
    tpm2()
        .args(["--target", target.path().to_str().unwrap(), "--compare-system"])
        .assert()
        .success()
        .stdout(predicate::str::contains("matches a fresh solve"));
}

#[test]
fn create_index_over_an_empty_directory_is_an_operational_error() {
    let dir = tempfile::tempdir().unwrap();
    tpm2()
        .args(["--create-index", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn mark_manual_on_an_unknown_package_is_an_operational_error() {
    let target = empty_target();
    tpm2()
        .args(["--target", target.path().to_str().unwrap(), "--mark-manual", "nonexistent"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn target_flag_is_honored_over_tpm_target_env() {
    let target = empty_target();
    let other = empty_target();
    tpm2()
        .env("TPM_TARGET", other.path())
        .args(["--target", target.path().to_str().unwrap(), "--list-installed"])
        .assert()
        .success();
}
