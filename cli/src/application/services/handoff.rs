//! Application service: start the game server once provisioning finished.
//!
//! Runs as the delayed follow-up job a completed provisioning run schedules.
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};
use gantry_common::ServerId;

use crate::application::ports::{ApplicationControl, ProviderClient, ServerStore, WrapperEndpoint};
use crate::application::services::setup::server_log;
use crate::domain::ProvisionConfig;

/// Outcome of the `start_application` use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The VM has no reachable address; nothing was attempted.
    Unreachable,
    /// The owner or server record no longer exists.
    Vanished,
}

/// Ask the server's wrapper to start the application process.
///
/// # Errors
///
/// Returns an error if the store fails or the wrapper rejects the request.
/// A rejected request is also recorded in the server log.
pub async fn start_application(
    store: &impl ServerStore,
    provider: &impl ProviderClient,
    control: &impl ApplicationControl,
    config: &ProvisionConfig,
    server_id: ServerId,
) -> Result<StartOutcome> {
    let Some(server) = store.load_server(server_id).await? else {
        return Ok(StartOutcome::Vanished);
    };
    let Some(owner) = store.load_owner(server.owner_id).await? else {
        return Ok(StartOutcome::Vanished);
    };

    let remote = provider.remote(&owner, &server).await;
    let (Some(host), None) = (remote.ip_address, remote.error.as_ref()) else {
        server_log(
            store,
            server.id,
            "Error starting Minecraft; the server has no reachable address",
        )
        .await?;
        return Ok(StartOutcome::Unreachable);
    };

    let endpoint = WrapperEndpoint {
        host,
        port: config.system.app_port,
        username: config.wrapper.username.clone(),
        password: server.application.wrapper_password.clone(),
    };
    if let Err(err) = control
        .start(&endpoint)
        .await
        .with_context(|| format!("starting Minecraft on {host}"))
    {
        server_log(
            store,
            server.id,
            &format!("Error starting Minecraft: {err:#}"),
        )
        .await?;
        return Err(err);
    }
    tracing::info!(server_id = %server.id, %host, "application started");
    Ok(StartOutcome::Started)
}
