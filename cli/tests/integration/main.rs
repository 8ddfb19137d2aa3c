//! Integration tests for gantry CLI
//!
//! These tests spawn the actual binary against a temporary store and config
//! and never reach the network.

mod cli_tests;
mod config_command;
mod provision_command;

use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

/// A `gantry` command isolated from the caller's home and environment.
pub fn gantry(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gantry"));
    cmd.env("NO_COLOR", "1")
        .env("HOME", dir.path())
        .env_remove("GANTRY_CONFIG")
        .env_remove("GANTRY_STORE")
        .env_remove("GANTRY_SSH_KEY_PATH")
        .env_remove("GANTRY_SSH_KEY_PASSPHRASE")
        .env_remove("GANTRY_PROVIDER_API_URL")
        .env_remove("RUST_LOG")
        .arg("--store")
        .arg(dir.path().join("store.json"))
        .arg("--config")
        .arg(dir.path().join("config.yaml"));
    cmd
}

/// Seed the store with one owner and `server` (JSON object).
pub fn seed(dir: &Path, server: &serde_json::Value) {
    let doc = serde_json::json!({
        "owners": [{"id": 1, "email": "alice@example.com"}],
        "servers": [server],
    });
    std::fs::write(
        dir.join("store.json"),
        serde_json::to_string_pretty(&doc).unwrap_or_default(),
    )
    .unwrap_or_else(|e| panic!("seeding store: {e}"));
}

/// A server with no provider VM behind it.
pub fn server_without_vm() -> serde_json::Value {
    serde_json::json!({
        "id": 10,
        "owner_id": 1,
        "ssh_keys_pending": "3,4",
        "pending_operation": "starting",
        "application": {
            "flavour": "vanilla/1.8.1",
            "name": "survival",
            "wrapper_password": "pw",
        }
    })
}
