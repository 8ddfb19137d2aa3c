//! Starting the application once provisioning finished.

#![allow(clippy::expect_used)]

use gantry_cli::application::ports::Remote;
use gantry_cli::application::services::handoff::{StartOutcome, start_application};
use gantry_cli::domain::ProvisionConfig;

use crate::fakes::{FakeControl, FakeProvider, FakeStore, SERVER, Timeline, owner, remote_at, server};

fn store() -> FakeStore {
    FakeStore::new(Timeline::default(), Some(owner()), Some(server()))
}

#[tokio::test]
async fn start_posts_wrapper_credentials_to_the_app_port() {
    let store = store();
    let provider = FakeProvider::new(Timeline::default(), remote_at("203.0.113.7"));
    let control = FakeControl::default();

    let outcome = start_application(&store, &provider, &control, &ProvisionConfig::default(), SERVER)
        .await
        .expect("start");

    assert_eq!(outcome, StartOutcome::Started);
    let calls = control.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].host.to_string(), "203.0.113.7");
    assert_eq!(calls[0].port, 5000);
    assert_eq!(calls[0].username, "gamocosm");
    assert_eq!(calls[0].password, "pw'1");
}

#[tokio::test]
async fn rejected_start_is_logged_and_returned() {
    let store = store();
    let provider = FakeProvider::new(Timeline::default(), remote_at("203.0.113.7"));
    let control = FakeControl::failing();

    let err = start_application(&store, &provider, &control, &ProvisionConfig::default(), SERVER)
        .await
        .expect_err("must fail");

    assert!(format!("{err:#}").contains("wrapper returned 500"));
    assert!(store.log()[0].starts_with("Error starting Minecraft: "));
}

#[tokio::test]
async fn unreachable_server_is_not_contacted() {
    let store = store();
    let provider = FakeProvider::new(Timeline::default(), Remote::missing());
    let control = FakeControl::default();

    let outcome = start_application(&store, &provider, &control, &ProvisionConfig::default(), SERVER)
        .await
        .expect("unreachable is reported, not raised");

    assert_eq!(outcome, StartOutcome::Unreachable);
    assert!(control.calls().is_empty());
    assert_eq!(store.log().len(), 1);
}

#[tokio::test]
async fn vanished_server_is_skipped() {
    let store = store();
    store.delete_server();
    let provider = FakeProvider::new(Timeline::default(), remote_at("203.0.113.7"));
    let control = FakeControl::default();

    let outcome = start_application(&store, &provider, &control, &ProvisionConfig::default(), SERVER)
        .await
        .expect("vanished");

    assert_eq!(outcome, StartOutcome::Vanished);
    assert!(control.calls().is_empty());
}
