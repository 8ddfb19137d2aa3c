//! Command sequences of the individual step executors.

#![allow(clippy::expect_used)]

use std::time::{Duration, Instant};

use gantry_cli::application::ports::RemoteShell;
use gantry_cli::application::services::setup::PhaseContext;
use gantry_cli::application::services::setup::phases;
use gantry_cli::domain::{Phase, ProvisionConfig, ProvisionError, RemoteCommand};
use gantry_common::{Owner, Server};

use crate::fakes::{FakeProvider, FakeShell, FakeStore, Timeline, owner, remote_at, server};

struct Fixture {
    shell: FakeShell,
    store: FakeStore,
    provider: FakeProvider,
    config: ProvisionConfig,
}

impl Fixture {
    fn new(server: Server, shell: impl FnOnce(Timeline) -> FakeShell) -> Self {
        let timeline = Timeline::default();
        Self {
            shell: shell(timeline.clone()),
            store: FakeStore::new(timeline.clone(), Some(owner()), Some(server)),
            provider: FakeProvider::new(timeline, remote_at("203.0.113.7")),
            config: ProvisionConfig::default(),
        }
    }

    fn ctx<'a>(
        &'a self,
        owner: &'a Owner,
        server: &'a Server,
    ) -> PhaseContext<'a, FakeShell, FakeStore, FakeProvider> {
        PhaseContext {
            shell: &self.shell,
            store: &self.store,
            provider: &self.provider,
            config: &self.config,
            owner,
            server,
        }
    }
}

// ── Budgets ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn budget_bounds_the_shell_while_the_phase_runs() {
    let shell = FakeShell::new(Timeline::default());
    let budget = Duration::from_secs(30);
    let started = Instant::now();

    phases::within_budget(&shell, Phase::Update, budget, async {
        let deadline = shell.deadline().expect("deadline set");
        assert!(deadline >= started + budget);
        assert!(deadline <= Instant::now() + budget);
        shell.execute(&RemoteCommand::new("true")).await
    })
    .await
    .expect("within budget");

    assert_eq!(shell.deadline(), None);
    assert_eq!(shell.unbounded_programs(), Vec::<&str>::new());
}

#[tokio::test(start_paused = true)]
async fn overrun_lifts_the_shell_deadline() {
    let shell = FakeShell::new(Timeline::default()).hanging_on("yum");

    let err = phases::within_budget(&shell, Phase::BaseInstall, Duration::from_secs(5), async {
        shell.execute(&RemoteCommand::new("yum")).await
    })
    .await
    .expect_err("must overrun");

    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::PhaseTimeout { phase: Phase::BaseInstall })
    ));
    assert_eq!(shell.deadline(), None);
}

// ── Port migration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn port_migration_is_a_no_op_on_the_default_port() {
    let s = server();
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    let ctx = fx.ctx(&owner, &s);

    phases::port_migration(&ctx).await.expect("no-op");

    assert!(fx.shell.commands().is_empty());
}

#[tokio::test]
async fn port_migration_issues_exactly_four_commands() {
    let mut s = server();
    s.ssh_port = 4022;
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    let ctx = fx.ctx(&owner, &s);

    phases::port_migration(&ctx).await.expect("migrate");

    assert_eq!(
        fx.shell.lines(),
        vec![
            "firewall-cmd '--add-port=4022/tcp'".to_string(),
            "firewall-cmd '--permanent' '--add-port=4022/tcp'".to_string(),
            "sed '-i' 's/^#Port 22$/Port 4022/' '/etc/ssh/sshd_config'".to_string(),
            "systemctl 'restart' 'sshd'".to_string(),
        ]
    );
}

// ── Base install ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn base_install_creates_user_and_swap_when_absent() {
    let s = server();
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    phases::base_install(&fx.ctx(&owner, &s)).await.expect("base install");

    let lines = fx.shell.lines();
    assert_eq!(lines[0], "id '-u' 'mcuser'");
    assert_eq!(lines[1], "adduser '-m' 'mcuser'");
    assert_eq!(
        lines[2],
        "echo 'alice@example.com+survival' | passwd '--stdin' 'mcuser'"
    );
    assert!(lines.contains(&"fallocate '-l' '1G' '/swapfile'".to_string()));
    assert!(lines.contains(&"echo '/swapfile none swap defaults 0 0' >> '/etc/fstab'".to_string()));
    assert!(lines.contains(&"yum '-y' 'update' '--security'".to_string()));
    assert!(lines.contains(&"firewall-cmd '--permanent' '--add-port=25565/udp'".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("python3-pip 'install' 'flask'"));
}

#[tokio::test]
async fn base_install_skips_existing_user_and_swap() {
    let s = server();
    let fx = Fixture::new(s.clone(), |t| {
        FakeShell::new(t).with_present("id").with_present("test")
    });
    let owner = owner();
    phases::base_install(&fx.ctx(&owner, &s)).await.expect("base install");

    let programs = fx.shell.programs();
    assert!(!programs.contains(&"adduser"));
    assert!(!programs.contains(&"fallocate"));
    assert!(!programs.contains(&"mkswap"));
    assert!(programs.contains(&"passwd"), "password is always reset");
}

#[tokio::test]
async fn base_install_opens_each_port_at_runtime_and_persistently() {
    let s = server();
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    phases::base_install(&fx.ctx(&owner, &s)).await.expect("base install");

    let firewall: Vec<_> = fx
        .shell
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("firewall-cmd"))
        .collect();
    assert_eq!(firewall.len(), 6);
}

// ── Flavour install ──────────────────────────────────────────────────────────

#[tokio::test]
async fn flavour_install_runs_the_selected_script_with_its_version() {
    let s = server();
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    phases::flavour_install(&fx.ctx(&owner, &s)).await.expect("flavour install");

    let lines = fx.shell.lines();
    assert!(lines.contains(
        &"cd '/home/mcuser/minecraft' && MINECRAFT_FLAVOUR_VERSION='1.8.1' bash '-c' \
          '/tmp/gamocosm-minecraft-flavours/vanilla.sh'"
            .to_string()
    ));
    assert_eq!(
        lines.last().map(String::as_str),
        Some("chown '-R' 'mcuser:mcuser' '/home/mcuser/minecraft'")
    );
    assert!(fx.store.log().is_empty());
}

#[tokio::test]
async fn unknown_flavour_falls_back_to_the_default_and_logs() {
    let mut s = server();
    s.application.flavour = "bukkit/9.9".to_string();
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    phases::flavour_install(&fx.ctx(&owner, &s)).await.expect("flavour install");

    assert_eq!(fx.store.server().application.flavour, "vanilla/1.8.1");
    assert_eq!(
        fx.store.log(),
        vec!["Flavour bukkit/9.9 not found! Installing default Vanilla 1.8.1".to_string()]
    );
    assert!(
        fx.shell
            .lines()
            .iter()
            .any(|l| l.contains("MINECRAFT_FLAVOUR_VERSION='1.8.1'"))
    );
}

#[tokio::test]
async fn empty_flavour_catalogue_is_an_error() {
    let mut s = server();
    s.application.flavour = "bukkit/9.9".to_string();
    let mut fx = Fixture::new(s.clone(), FakeShell::new);
    fx.config.flavours.catalogue.clear();
    let owner = owner();
    let result = phases::flavour_install(&fx.ctx(&owner, &s)).await;

    assert!(result.is_err());
    assert!(fx.shell.commands().is_empty());
}

// ── Wrapper install and update ───────────────────────────────────────────────

#[tokio::test]
async fn wrapper_install_writes_escaped_credentials() {
    let s = server();
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    phases::wrapper_install(&fx.ctx(&owner, &s)).await.expect("wrapper install");

    let lines = fx.shell.lines();
    assert_eq!(lines[0], "rm '-rf' '/opt/gamocosm'");
    assert_eq!(lines[2], "echo 'gamocosm' > '/opt/gamocosm/mcsw-auth.txt'");
    assert_eq!(lines[3], r"echo 'pw'\''1' >> '/opt/gamocosm/mcsw-auth.txt'");
    assert_eq!(
        lines[5],
        "cp '/opt/gamocosm/mcsw.service' '/etc/systemd/system/mcsw.service'"
    );
    assert_eq!(
        &lines[6..],
        ["systemctl 'enable' 'mcsw'", "systemctl 'start' 'mcsw'"]
    );
}

#[tokio::test]
async fn update_pulls_as_the_service_user() {
    let s = server();
    let fx = Fixture::new(s.clone(), FakeShell::new);
    let owner = owner();
    phases::update(&fx.ctx(&owner, &s)).await.expect("update");

    let lines = fx.shell.lines();
    assert_eq!(
        lines[1],
        r"cd '/opt/gamocosm' && su 'mcuser' -c 'git '\''pull'\'' '\''origin'\'' '\''master'\'''"
    );
    assert_eq!(lines[4], "systemctl 'restart' 'mcsw'");
}
