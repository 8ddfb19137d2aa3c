//! `gantry config` shows the effective configuration.

use predicates::prelude::*;
use tempfile::TempDir;

use crate::gantry;

#[test]
fn test_config_without_file_prints_defaults() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));

    gantry(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_attempt: 11"))
        .stdout(predicate::str::contains("stage_policy: restart"))
        .stdout(predicate::str::contains("https://api.digitalocean.com"));
}

#[test]
fn test_config_file_values_are_used() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    std::fs::write(
        dir.path().join("config.yaml"),
        "stage_policy: resume\nsystem:\n  service_user: gamer\n",
    )
    .unwrap_or_else(|e| panic!("{e}"));

    gantry(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("stage_policy: resume"))
        .stdout(predicate::str::contains("service_user: gamer"));
}

#[test]
fn test_config_env_overrides_and_hides_passphrase() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));

    gantry(&dir)
        .env("GANTRY_PROVIDER_API_URL", "http://127.0.0.1:9")
        .env("GANTRY_SSH_KEY_PASSPHRASE", "hunter2")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:9"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_config_json_includes_path() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));

    gantry(&dir)
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""path""#))
        .stdout(predicate::str::contains("config.yaml"));
}

#[test]
fn test_malformed_config_is_reported() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    std::fs::write(dir.path().join("config.yaml"), "retry: nope\n")
        .unwrap_or_else(|e| panic!("{e}"));

    gantry(&dir)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"));
}
