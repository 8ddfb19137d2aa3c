//! Stage orchestrator: one provisioning run, from entry checks to handoff.

use std::time::Duration;

use anyhow::Result;
use gantry_common::{Owner, Server};
use tracing::Instrument;

use super::phases;
use super::probe::{ProbeOutcome, probe};
use super::retry::handle_connect_timeout;
use super::{PhaseContext, server_log};
use crate::application::ports::{
    JobScheduler, ProviderClient, ProvisionJob, RemoteConnector, RemoteShell, ServerStore,
    SshTarget,
};
use crate::domain::{Phase, ProvisionConfig, SetupBranch, is_vanished};

/// How a provisioning run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Every phase of `branch` ran and the application start was scheduled.
    Completed { branch: SetupBranch },
    /// The host was unreachable; the run was re-enqueued.
    Rescheduled { attempt: u32, delay: Duration },
    /// The host stayed unreachable past the attempt ceiling.
    GaveUp,
    /// The VM is missing or the provider reported an error.
    Aborted,
    /// The owner or server record no longer exists.
    Vanished,
}

/// Collaborators for a provisioning run.
pub struct SetupServices<'a, St, Pr, Co, Sc> {
    pub store: &'a St,
    pub provider: &'a Pr,
    pub connector: &'a Co,
    pub scheduler: &'a Sc,
    pub config: &'a ProvisionConfig,
}

/// Provision `job.server` for `job.owner`.
///
/// Any failure other than a connectivity timeout is logged to the server,
/// the server is marked partial, and the error is returned. A run whose
/// records have vanished is a no-op.
///
/// # Errors
///
/// Returns the first fatal error raised by the store, the provider, the
/// transport or a phase.
pub async fn provision_server<St, Pr, Co, Sc>(
    svc: &SetupServices<'_, St, Pr, Co, Sc>,
    job: ProvisionJob,
) -> Result<ProvisionOutcome>
where
    St: ServerStore,
    Pr: ProviderClient,
    Co: RemoteConnector,
    Sc: JobScheduler,
{
    let span = tracing::info_span!(
        "provision",
        server_id = %job.server,
        owner_id = %job.owner,
        attempt = job.attempt,
    );
    async {
        match run(svc, job).await {
            Ok(outcome) => {
                tracing::info!(?outcome, "provisioning run finished");
                Ok(outcome)
            }
            Err(err) if is_vanished(&err) => {
                tracing::debug!(error = %err, "record vanished mid-run");
                Ok(ProvisionOutcome::Vanished)
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "provisioning run failed");
                fail(svc.store, job, &err).await;
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}

/// Top-level failure bookkeeping. Secondary store errors are only traced,
/// so the original error is the one the caller sees.
async fn fail(store: &impl ServerStore, job: ProvisionJob, err: &anyhow::Error) {
    let message = format!("Background job setting up server failed: {err:#}");
    if let Err(log_err) = server_log(store, job.server, &message).await {
        tracing::warn!(error = %log_err, "could not record failure in server log");
    }
    if let Err(reset_err) = store.reset_partial(job.server).await {
        tracing::warn!(error = %reset_err, "could not reset partial state");
    }
}

async fn run<St, Pr, Co, Sc>(
    svc: &SetupServices<'_, St, Pr, Co, Sc>,
    job: ProvisionJob,
) -> Result<ProvisionOutcome>
where
    St: ServerStore,
    Pr: ProviderClient,
    Co: RemoteConnector,
    Sc: JobScheduler,
{
    let Some(owner) = svc.store.load_owner(job.owner).await? else {
        return Ok(ProvisionOutcome::Vanished);
    };
    let Some(server) = svc.store.load_server(job.server).await? else {
        return Ok(ProvisionOutcome::Vanished);
    };

    let remote = svc.provider.remote(&owner, &server).await;
    let host = match (remote.exists(), &remote.error, remote.ip_address) {
        (true, None, Some(ip)) => ip,
        (exists, error, _) => {
            let message = if !exists {
                "Error starting server; remote_id is nil. Aborting".to_string()
            } else if let Some(error) = error {
                format!(
                    "Error communicating with Digital Ocean while starting server; \
                     they responded with {error}. Aborting"
                )
            } else {
                "Error starting server; it has no IP address yet. Aborting".to_string()
            };
            server_log(svc.store, server.id, &message).await?;
            svc.store.reset_partial(server.id).await?;
            return Ok(ProvisionOutcome::Aborted);
        }
    };

    let target = SshTarget {
        host: host.to_string(),
        port: server.connect_port(),
        user: svc.config.ssh.user.clone(),
        private_key: svc.config.ssh.private_key_path.clone(),
        passphrase: svc.config.ssh.private_key_passphrase.clone(),
        connect_timeout: svc.config.retry.probe_timeout(),
    };
    let session = match probe(svc.connector, &target).await? {
        ProbeOutcome::Reachable(session) => session,
        ProbeOutcome::TimedOut(cause) => {
            return handle_connect_timeout(svc.store, svc.scheduler, &svc.config.retry, job, &cause)
                .await;
        }
    };
    tracing::info!(host = %target.host, port = target.port, "host reachable");

    let branch = SetupBranch::select(server.done_setup);
    run_branch(svc, &session, &owner, &server, branch).await?;

    svc.store.complete_setup(server.id).await?;
    svc.scheduler
        .schedule_start_application(server.id, svc.config.start_delay())
        .await?;
    Ok(ProvisionOutcome::Completed { branch })
}

async fn run_branch<St, Pr, Co, Sc, Sh>(
    svc: &SetupServices<'_, St, Pr, Co, Sc>,
    shell: &Sh,
    owner: &Owner,
    server: &Server,
    branch: SetupBranch,
) -> Result<()>
where
    St: ServerStore,
    Pr: ProviderClient,
    Sh: RemoteShell,
{
    let ctx = PhaseContext {
        shell,
        store: svc.store,
        provider: svc.provider,
        config: svc.config,
        owner,
        server,
    };
    let policy = svc.config.stage_policy;
    let persisted = server.remote_setup_stage;
    let mut reached = persisted;

    for &phase in branch.phases() {
        if !policy.should_run(branch, phase, persisted) {
            tracing::info!(%phase, stage = %persisted, "skipping finished phase");
            continue;
        }
        if branch == SetupBranch::FirstTimeInstall {
            if let Some(stage) = phase
                .checkpoint()
                .filter(|stage| policy.records(*stage, reached))
            {
                svc.store.set_setup_stage(server.id, stage).await?;
                reached = stage;
            }
        }
        tracing::info!(%phase, "running phase");
        run_phase(&ctx, phase).await?;
    }
    Ok(())
}

async fn run_phase<Sh, St, Pr>(ctx: &PhaseContext<'_, Sh, St, Pr>, phase: Phase) -> Result<()>
where
    Sh: RemoteShell,
    St: ServerStore,
    Pr: ProviderClient,
{
    match phase {
        Phase::BaseInstall => phases::base_install(ctx).await,
        Phase::Update => phases::update(ctx).await,
        Phase::KeyInstall => phases::key_install(ctx).await,
        Phase::FlavourInstall => phases::flavour_install(ctx).await,
        Phase::WrapperInstall => phases::wrapper_install(ctx).await,
        Phase::PortMigration => phases::port_migration(ctx).await,
    }
}
