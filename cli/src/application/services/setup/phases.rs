//! Step executors, one per provisioning phase.
//!
//! Each executor runs a fixed, order-significant command sequence on the
//! run's session under its own time budget. Exceeding the budget raises
//! `ProvisionError::PhaseTimeout`; command failures propagate unchanged.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use gantry_common::DEFAULT_SSH_PORT;

use super::{PhaseContext, server_log};
use crate::application::ports::{ProviderClient, RemoteShell, ServerStore};
use crate::domain::{FlavourInfo, Phase, ProvisionError, RemoteCommand};

/// Run `work` under `budget`, converting an overrun into a phase timeout.
///
/// The same deadline is set on `shell`, so a command blocked in the
/// transport is abandoned there too instead of outliving the phase.
///
/// # Errors
///
/// Returns `ProvisionError::PhaseTimeout` on overrun, otherwise whatever
/// `work` returned.
pub async fn within_budget<T>(
    shell: &impl RemoteShell,
    phase: Phase,
    budget: Duration,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    shell.set_deadline(Some(Instant::now() + budget));
    let outcome = tokio::time::timeout(budget, work).await;
    shell.set_deadline(None);
    if let Ok(result) = outcome {
        result
    } else {
        tracing::warn!(%phase, budget_secs = budget.as_secs(), "phase exceeded its time budget");
        Err(ProvisionError::PhaseTimeout { phase }.into())
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Open `spec` (e.g. `5000/tcp`) in the firewall now and across reboots.
async fn open_port(shell: &impl RemoteShell, spec: &str) -> Result<()> {
    let rule = format!("--add-port={spec}");
    shell
        .execute(&RemoteCommand::new("firewall-cmd").arg(rule.as_str()))
        .await?;
    shell
        .execute(&RemoteCommand::new("firewall-cmd").args(["--permanent", rule.as_str()]))
        .await
}

// ── Base install ─────────────────────────────────────────────────────────────

/// Service user, swap, OS packages, security updates, firewall, python deps.
///
/// # Errors
///
/// Returns an error if any command fails or the phase budget is exceeded.
pub async fn base_install<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>) -> Result<()>
where
    Sh: RemoteShell,
{
    let sys = &ctx.config.system;
    let user = sys.service_user.as_str();
    let password = format!("{}+{}", ctx.owner.email, ctx.server.application.name);
    let shell = ctx.shell;

    within_budget(
        shell,
        Phase::BaseInstall,
        secs(ctx.config.budgets.base_install_secs),
        async {
            if !shell
                .test(&RemoteCommand::new("id").args(["-u", user]))
                .await?
            {
                shell
                    .execute(&RemoteCommand::new("adduser").args(["-m", user]))
                    .await?;
            }
            shell
                .execute(
                    &RemoteCommand::new("passwd")
                        .args(["--stdin", user])
                        .stdin_line(password.as_str()),
                )
                .await?;
            shell
                .execute(&RemoteCommand::new("usermod").args([
                    "-aG",
                    sys.service_group.as_str(),
                    user,
                ]))
                .await?;

            let swap = sys.swap_file.as_str();
            if !shell
                .test(&RemoteCommand::new("test").args(["-f", swap]))
                .await?
            {
                shell
                    .execute(&RemoteCommand::new("fallocate").args([
                        "-l",
                        sys.swap_size.as_str(),
                        swap,
                    ]))
                    .await?;
                shell
                    .execute(&RemoteCommand::new("chmod").args(["600", swap]))
                    .await?;
                shell
                    .execute(&RemoteCommand::new("mkswap").arg(swap))
                    .await?;
                shell
                    .execute(&RemoteCommand::new("swapon").arg(swap))
                    .await?;
                shell
                    .execute(
                        &RemoteCommand::new("echo")
                            .arg(format!("{swap} none swap defaults 0 0"))
                            .append_to("/etc/fstab"),
                    )
                    .await?;
            }

            shell
                .execute(
                    &RemoteCommand::new("yum")
                        .args(["-y", "install"])
                        .args(sys.packages.iter().map(String::as_str)),
                )
                .await?;
            shell
                .execute(&RemoteCommand::new("yum").args(["-y", "update", "--security"]))
                .await?;

            open_port(shell, &format!("{}/tcp", sys.app_port)).await?;
            open_port(shell, &format!("{}/tcp", sys.game_port)).await?;
            open_port(shell, &format!("{}/udp", sys.game_port)).await?;

            let pip_build = format!("{}/pip_build_root", sys.scratch_dir);
            shell
                .execute(&RemoteCommand::new("rm").args(["-rf", pip_build.as_str()]))
                .await?;
            if !sys.python_packages.is_empty() {
                shell
                    .execute(
                        &RemoteCommand::new("python3-pip")
                            .arg("install")
                            .args(sys.python_packages.iter().map(String::as_str)),
                    )
                    .await?;
            }
            Ok(())
        },
    )
    .await
}

// ── Update (refresh branch) ──────────────────────────────────────────────────

/// Pull the latest wrapper source and restart its service.
///
/// # Errors
///
/// Returns an error if any command fails or the phase budget is exceeded.
pub async fn update<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>) -> Result<()>
where
    Sh: RemoteShell,
{
    let wrapper = &ctx.config.wrapper;
    let user = ctx.config.system.service_user.as_str();
    let dir = wrapper.install_dir.as_str();
    let unit = format!("{}.service", wrapper.service_name);
    let shell = ctx.shell;

    within_budget(shell, Phase::Update, secs(ctx.config.budgets.update_secs), async {
        shell
            .execute(
                &RemoteCommand::new("git")
                    .args(["checkout", "master"])
                    .as_user(user)
                    .current_dir(dir),
            )
            .await?;
        shell
            .execute(
                &RemoteCommand::new("git")
                    .args(["pull", "origin", "master"])
                    .as_user(user)
                    .current_dir(dir),
            )
            .await?;
        shell
            .execute(&RemoteCommand::new("cp").args([
                format!("{dir}/{unit}"),
                format!("/etc/systemd/system/{unit}"),
            ]))
            .await?;
        shell
            .execute(&RemoteCommand::new("systemctl").arg("daemon-reload"))
            .await?;
        shell
            .execute(
                &RemoteCommand::new("systemctl").args(["restart", wrapper.service_name.as_str()]),
            )
            .await
    })
    .await
}

// ── Flavour install ──────────────────────────────────────────────────────────

/// Look up the server's flavour, falling back to the catalogue default.
///
/// On fallback the record is rewritten and a warning goes to the server log.
async fn resolve_flavour<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>) -> Result<FlavourInfo>
where
    St: ServerStore,
{
    let catalogue = &ctx.config.flavours;
    let requested = ctx.server.application.flavour.as_str();
    if let Some(info) = catalogue.find(requested) {
        return Ok(info.clone());
    }
    let fallback = catalogue
        .default_flavour()
        .context("no flavours configured")?
        .clone();
    tracing::warn!(requested, fallback = %fallback.id, "unknown flavour");
    server_log(
        ctx.store,
        ctx.server.id,
        &format!(
            "Flavour {requested} not found! Installing default {}",
            fallback.name
        ),
    )
    .await?;
    ctx.store.set_flavour(ctx.server.id, &fallback.id).await?;
    Ok(fallback)
}

/// Clone the flavour scripts and run the selected one in the install dir.
///
/// Budget: the flavour's estimated minutes, doubled.
///
/// # Errors
///
/// Returns an error if no flavour can be resolved, any command fails, or
/// the phase budget is exceeded.
pub async fn flavour_install<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>) -> Result<()>
where
    Sh: RemoteShell,
    St: ServerStore,
{
    let flavour = resolve_flavour(ctx).await?;
    let (script, version) = flavour.script_and_version();
    let sys = &ctx.config.system;
    let user = sys.service_user.as_str();
    let repo_dir = format!("{}/gamocosm-minecraft-flavours", sys.scratch_dir);
    let script_path = format!("{repo_dir}/{script}.sh");
    let install_dir = format!("/home/{user}/minecraft");
    let owner = format!("{user}:{user}");
    let shell = ctx.shell;

    within_budget(shell, Phase::FlavourInstall, flavour.install_budget(), async {
        shell
            .execute(&RemoteCommand::new("rm").args(["-rf", repo_dir.as_str()]))
            .await?;
        shell
            .execute(&RemoteCommand::new("git").args([
                "clone",
                ctx.config.flavours.git_url.as_str(),
                repo_dir.as_str(),
            ]))
            .await?;
        shell
            .execute(&RemoteCommand::new("mkdir").args(["-p", install_dir.as_str()]))
            .await?;
        shell
            .execute(&RemoteCommand::new("chmod").args(["u+x", script_path.as_str()]))
            .await?;
        shell
            .execute(
                &RemoteCommand::new("bash")
                    .args(["-c", script_path.as_str()])
                    .env("MINECRAFT_FLAVOUR_VERSION", version)
                    .current_dir(install_dir.as_str()),
            )
            .await?;
        shell
            .execute(&RemoteCommand::new("chown").args(["-R", owner.as_str(), install_dir.as_str()]))
            .await
    })
    .await
}

// ── Wrapper install ──────────────────────────────────────────────────────────

/// Clone the wrapper, write its credentials, install and start its unit.
///
/// # Errors
///
/// Returns an error if any command fails or the phase budget is exceeded.
pub async fn wrapper_install<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>) -> Result<()>
where
    Sh: RemoteShell,
{
    let wrapper = &ctx.config.wrapper;
    let user = ctx.config.system.service_user.as_str();
    let dir = wrapper.install_dir.as_str();
    let auth_file = format!("{dir}/{}", wrapper.auth_file);
    let unit = format!("{}.service", wrapper.service_name);
    let service = wrapper.service_name.as_str();
    let shell = ctx.shell;

    within_budget(
        shell,
        Phase::WrapperInstall,
        secs(ctx.config.budgets.wrapper_install_secs),
        async {
            shell
                .execute(&RemoteCommand::new("rm").args(["-rf", dir]))
                .await?;
            shell
                .execute(&RemoteCommand::new("git").args(["clone", wrapper.git_url.as_str(), dir]))
                .await?;
            shell
                .execute(
                    &RemoteCommand::new("echo")
                        .arg(wrapper.username.as_str())
                        .write_to(auth_file.as_str()),
                )
                .await?;
            shell
                .execute(
                    &RemoteCommand::new("echo")
                        .arg(ctx.server.application.wrapper_password.as_str())
                        .append_to(auth_file.as_str()),
                )
                .await?;
            shell
                .execute(&RemoteCommand::new("chown").args([
                    "-R".to_string(),
                    format!("{user}:{user}"),
                    dir.to_string(),
                ]))
                .await?;
            shell
                .execute(&RemoteCommand::new("cp").args([
                    format!("{dir}/{unit}"),
                    format!("/etc/systemd/system/{unit}"),
                ]))
                .await?;
            shell
                .execute(&RemoteCommand::new("systemctl").args(["enable", service]))
                .await?;
            shell
                .execute(&RemoteCommand::new("systemctl").args(["start", service]))
                .await
        },
    )
    .await
}

// ── Port migration ───────────────────────────────────────────────────────────

/// Move the SSH daemon to the server's configured port.
///
/// No-op on the default port. The config rewrite only matches the stock
/// commented `#Port 22` line.
///
/// # Errors
///
/// Returns an error if any command fails or the phase budget is exceeded.
pub async fn port_migration<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>) -> Result<()>
where
    Sh: RemoteShell,
{
    let port = ctx.server.ssh_port;
    if port == DEFAULT_SSH_PORT {
        return Ok(());
    }
    let shell = ctx.shell;

    within_budget(
        shell,
        Phase::PortMigration,
        secs(ctx.config.budgets.port_migration_secs),
        async {
            open_port(shell, &format!("{port}/tcp")).await?;
            shell
                .execute(&RemoteCommand::new("sed").args([
                    "-i".to_string(),
                    format!("s/^#Port 22$/Port {port}/"),
                    "/etc/ssh/sshd_config".to_string(),
                ]))
                .await?;
            shell
                .execute(&RemoteCommand::new("systemctl").args(["restart", "sshd"]))
                .await
        },
    )
    .await
}

// ── Key install ──────────────────────────────────────────────────────────────

/// Install the owner's pending provider keys for the service user.
///
/// Lookup errors go to the server log. The pending field is cleared after
/// the lookups and before any remote command, so each requested key is
/// appended at most once even if this phase fails.
///
/// # Errors
///
/// Returns an error if the store fails, any command fails, or the phase
/// budget is exceeded.
pub async fn key_install<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>) -> Result<()>
where
    Sh: RemoteShell,
    St: ServerStore,
    Pr: ProviderClient,
{
    let key_ids = ctx.server.pending_key_ids();
    if key_ids.is_empty() {
        return Ok(());
    }

    let mut keys = Vec::with_capacity(key_ids.len());
    for key_id in &key_ids {
        match ctx.provider.public_key(ctx.owner, key_id).await {
            Ok(key) => keys.push(key),
            Err(err) => {
                server_log(
                    ctx.store,
                    ctx.server.id,
                    &format!("Error getting SSH key {key_id}: {err:#}"),
                )
                .await?;
            }
        }
    }
    ctx.store.clear_pending_keys(ctx.server.id).await?;

    let user = ctx.config.system.service_user.as_str();
    let ssh_dir = format!("/home/{user}/.ssh/");
    let authorized_keys = format!("{ssh_dir}authorized_keys");
    let shell = ctx.shell;

    within_budget(
        shell,
        Phase::KeyInstall,
        secs(ctx.config.budgets.key_install_secs),
        async {
            shell
                .execute(&RemoteCommand::new("mkdir").args(["-p", ssh_dir.as_str()]))
                .await?;
            for key in &keys {
                shell
                    .execute(
                        &RemoteCommand::new("echo")
                            .arg(key.as_str())
                            .append_to(authorized_keys.as_str()),
                    )
                    .await?;
            }
            shell
                .execute(&RemoteCommand::new("chown").args([
                    "-R".to_string(),
                    format!("{user}:{user}"),
                    ssh_dir.clone(),
                ]))
                .await?;
            shell
                .execute(&RemoteCommand::new("chmod").args(["700", ssh_dir.as_str()]))
                .await?;
            shell
                .execute(&RemoteCommand::new("chmod").args(["600", authorized_keys.as_str()]))
                .await
        },
    )
    .await
}
