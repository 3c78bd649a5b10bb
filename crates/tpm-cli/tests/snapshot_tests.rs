//! CLI tests against a small fixture repository: one `.tpm2` package laid
//! out the way `DirectoryRepository` expects it, reached through a
//! hand-written `config.xml`.

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use tpm_transport::{SectionType, build_transport_file};

fn tpm2() -> Command {
    Command::new(cargo_bin!("tpm2"))
}

fn run_and_capture(target: &Path, args: &[&str]) -> String {
    let output = tpm2()
        .args(["--target", target.to_str().unwrap()])
        .args(args)
        .output()
        .expect("failed to execute tpm2");
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const LIBFOO_DESC: &str = r#"<pkg file_version="2.0">
        <name>libfoo</name>
        <arch>amd64</arch>
        <version>1.2</version>
        <source_version>1.2</source_version>
    </pkg>"#;

fn fixture_with_one_package() -> TempDir {
    let target = tempfile::tempdir().unwrap();
    let repo_dir = target.path().join("var/lib/tpm/repos/main/amd64");
    std::fs::create_dir_all(&repo_dir).unwrap();

    // Two zeroed 512-byte blocks are a valid, empty tar archive.
    let empty_tar = vec![0u8; 1024];
    let archive = build_transport_file(&[
        (SectionType::Desc, LIBFOO_DESC.as_bytes()),
        (SectionType::Archive, &empty_tar),
    ]);
    std::fs::write(repo_dir.join("libfoo-1.2_amd64.tpm2"), archive).unwrap();

    let etc = target.path().join("etc/tpm2");
    std::fs::create_dir_all(&etc).unwrap();
    std::fs::write(
        etc.join("config.xml"),
        r#"<config><repositories><repo path="/var/lib/tpm/repos/main"/></repositories></config>"#,
    )
    .unwrap();

    target
}

#[test]
fn list_available_shows_the_fixture_package() {
    let target = fixture_with_one_package();
    let out = run_and_capture(target.path(), &["--list-available"]);
    assert!(out.contains("libfoo"));
    assert!(out.contains("amd64"));
    assert!(out.contains("1.2"));
}

#[test]
fn installation_graph_resolves_the_fixture_package() {
    let target = fixture_with_one_package();
    let out = run_and_capture(target.path(), &["--installation-graph", "libfoo"]);
    assert!(out.contains("libfoo/amd64"));
    assert!(out.contains("1.2"));
    assert!(out.contains("manual"));
}

#[test]
fn list_available_on_an_unconfigured_target_is_empty() {
    let target = tempfile::tempdir().unwrap();
    let out = run_and_capture(target.path(), &["--list-available"]);
    assert!(out.contains("no packages available"));
}

#[test]
fn install_without_confirmation_is_aborted() {
    // Outside a terminal, the confirmation prompt falls back to its
    // configured default (no) rather than blocking on stdin.
    let target = fixture_with_one_package();
    tpm2()
        .args(["--target", target.path().to_str().unwrap(), "--install", "libfoo"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn install_with_assume_yes_succeeds() {
    let target = fixture_with_one_package();
    tpm2()
        .args([
            "--target",
            target.path().to_str().unwrap(),
            "--install",
            "libfoo",
            "--assume-yes",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed libfoo/amd64"));
}
