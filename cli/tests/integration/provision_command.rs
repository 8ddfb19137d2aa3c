//! `gantry provision` end to end, for runs that stop before any SSH.

use predicates::prelude::*;
use tempfile::TempDir;

use crate::{gantry, seed, server_without_vm};

fn stored_server(dir: &TempDir) -> serde_json::Value {
    let content = std::fs::read_to_string(dir.path().join("store.json"))
        .unwrap_or_else(|e| panic!("reading store: {e}"));
    let doc: serde_json::Value =
        serde_json::from_str(&content).unwrap_or_else(|e| panic!("parsing store: {e}"));
    doc["servers"][0].clone()
}

#[test]
fn test_provision_without_vm_aborts_and_marks_partial() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    seed(dir.path(), &server_without_vm());

    gantry(&dir)
        .args(["provision", "--owner", "1", "--server", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("provision server 10 (attempt 0): aborted"));

    let server = stored_server(&dir);
    assert!(server.get("pending_operation").is_none());
    assert_eq!(
        server["application"]["log"][0]["message"],
        "Error starting server; remote_id is nil. Aborting"
    );
    assert_eq!(server["remote_setup_stage"], 0);
    assert_eq!(server["ssh_keys_pending"], "3,4", "nothing else is touched");
}

#[test]
fn test_provision_json_reports_each_job() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    seed(dir.path(), &server_without_vm());

    let out = gantry(&dir)
        .args(["--json", "provision", "--owner", "1", "--server", "10", "--attempt", "5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let reports: serde_json::Value =
        serde_json::from_slice(&out).unwrap_or_else(|e| panic!("invalid JSON: {e}"));
    assert_eq!(
        reports,
        serde_json::json!([{
            "job": "provision",
            "server_id": 10,
            "attempt": 5,
            "outcome": "aborted",
        }])
    );
}

#[test]
fn test_provision_of_missing_server_is_a_no_op() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    seed(dir.path(), &server_without_vm());

    gantry(&dir)
        .args(["provision", "--owner", "1", "--server", "99"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vanished"));
}

#[test]
fn test_provision_with_empty_store_is_a_no_op() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));

    gantry(&dir)
        .args(["provision", "--owner", "1", "--server", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vanished"));
    assert!(!dir.path().join("store.json").exists());
}

#[test]
fn test_provision_with_corrupt_store_fails() {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("{e}"));
    std::fs::write(dir.path().join("store.json"), "{not json")
        .unwrap_or_else(|e| panic!("{e}"));

    gantry(&dir)
        .args(["provision", "--owner", "1", "--server", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing store file"));
}
