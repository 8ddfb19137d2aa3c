//! CLI structure and argument parsing.

use predicates::prelude::*;
use tempfile::TempDir;

use crate::gantry;

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("gantry"))
        .env_remove("GANTRY_CONFIG")
        .env_remove("GANTRY_STORE")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Provision game servers"));
}

#[test]
fn test_cli_help_lists_commands() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    gantry(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    gantry(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gantry"));
}

#[test]
fn test_provision_requires_owner_and_server() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    gantry(&dir)
        .args(["provision", "--server", "10"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--owner"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    gantry(&dir).arg("frobnicate").assert().code(2);
}
