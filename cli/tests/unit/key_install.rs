//! Key installation: lookups, clearing order and idempotency bound.

#![allow(clippy::expect_used)]

use gantry_cli::application::services::setup::{PhaseContext, phases};
use gantry_cli::domain::ProvisionConfig;
use gantry_common::Server;

use crate::fakes::{FakeProvider, FakeShell, FakeStore, Timeline, owner, remote_at, server};

struct Fixture {
    timeline: Timeline,
    shell: FakeShell,
    store: FakeStore,
    provider: FakeProvider,
    config: ProvisionConfig,
}

fn fixture(pending: Option<&str>, provider: impl FnOnce(FakeProvider) -> FakeProvider) -> (Fixture, Server) {
    let mut s = server();
    s.ssh_keys_pending = pending.map(String::from);
    let timeline = Timeline::default();
    let fx = Fixture {
        shell: FakeShell::new(timeline.clone()),
        store: FakeStore::new(timeline.clone(), Some(owner()), Some(s.clone())),
        provider: provider(FakeProvider::new(timeline.clone(), remote_at("203.0.113.7"))),
        config: ProvisionConfig::default(),
        timeline,
    };
    (fx, s)
}

async fn install(fx: &Fixture, s: &Server) -> anyhow::Result<()> {
    let owner = owner();
    let ctx = PhaseContext {
        shell: &fx.shell,
        store: &fx.store,
        provider: &fx.provider,
        config: &fx.config,
        owner: &owner,
        server: s,
    };
    phases::key_install(&ctx).await
}

#[tokio::test]
async fn no_pending_keys_is_a_no_op() {
    for pending in [None, Some(""), Some(" , ,")] {
        let (fx, s) = fixture(pending, |p| p);
        install(&fx, &s).await.expect("no-op");
        assert!(fx.shell.commands().is_empty(), "{pending:?}");
        assert!(fx.provider.lookups().is_empty());
    }
}

#[tokio::test]
async fn failed_lookup_is_logged_and_the_rest_installed() {
    let (fx, s) = fixture(Some("A,B"), |p| {
        p.with_key("A", "ssh-ed25519 AAAA alice")
            .with_key_error("B", "not found on account")
    });

    install(&fx, &s).await.expect("key install");

    let appends: Vec<_> = fx
        .shell
        .lines()
        .into_iter()
        .filter(|l| l.contains(">> '/home/mcuser/.ssh/authorized_keys'"))
        .collect();
    assert_eq!(
        appends,
        vec!["echo 'ssh-ed25519 AAAA alice' >> '/home/mcuser/.ssh/authorized_keys'".to_string()]
    );
    let log = fx.store.log();
    assert_eq!(log.len(), 1);
    assert!(log[0].contains('B'));
    assert!(log[0].contains("not found on account"));
    assert!(fx.store.server().ssh_keys_pending.is_none());
}

#[tokio::test]
async fn pending_field_is_cleared_after_lookups_and_before_commands() {
    let (fx, s) = fixture(Some("A"), |p| p.with_key("A", "ssh-rsa AAAA a"));

    install(&fx, &s).await.expect("key install");

    let lookup = fx.timeline.position("provider: key A").expect("lookup");
    let clear = fx.timeline.position("store: clear keys").expect("clear");
    let first_command = fx.timeline.position("sh: ").expect("command");
    assert!(lookup < clear && clear < first_command);
}

#[tokio::test]
async fn pending_field_is_cleared_even_when_a_command_fails() {
    let (mut fx, s) = fixture(Some("A"), |p| p.with_key("A", "ssh-rsa AAAA a"));
    fx.shell = FakeShell::new(fx.timeline.clone()).failing_on("chown");

    assert!(install(&fx, &s).await.is_err());
    assert!(fx.store.server().ssh_keys_pending.is_none());
}

#[tokio::test]
async fn permissions_are_fixed_even_if_every_lookup_failed() {
    let (fx, s) = fixture(Some("X"), |p| p);

    install(&fx, &s).await.expect("key install");

    assert_eq!(
        fx.shell.lines(),
        vec![
            "mkdir '-p' '/home/mcuser/.ssh/'".to_string(),
            "chown '-R' 'mcuser:mcuser' '/home/mcuser/.ssh/'".to_string(),
            "chmod '700' '/home/mcuser/.ssh/'".to_string(),
            "chmod '600' '/home/mcuser/.ssh/authorized_keys'".to_string(),
        ]
    );
}

#[tokio::test]
async fn keys_with_quotes_are_escaped() {
    let (fx, s) = fixture(Some("A"), |p| p.with_key("A", "ssh-rsa AAAA it's me"));

    install(&fx, &s).await.expect("key install");

    assert!(fx.shell.lines().contains(
        &r"echo 'ssh-rsa AAAA it'\''s me' >> '/home/mcuser/.ssh/authorized_keys'".to_string()
    ));
}
