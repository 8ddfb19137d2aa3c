//! Remote provisioning of a freshly created VM.
//!
//! `orchestrator` sequences the step executors in `phases`, after `probe`
//! has confirmed the host is reachable; `retry` handles probe timeouts.
//! Imports only from `crate::domain` and `crate::application::ports`.

pub mod orchestrator;
pub mod phases;
pub mod probe;
pub mod retry;

use anyhow::Result;
use gantry_common::{Owner, Server, ServerId};

use crate::application::ports::ServerStore;
use crate::domain::ProvisionConfig;

pub use orchestrator::{ProvisionOutcome, SetupServices, provision_server};

/// Everything a step executor needs: one open session plus read access to
/// the records loaded at the top of the run.
pub struct PhaseContext<'a, Sh, St, Pr> {
    pub shell: &'a Sh,
    pub store: &'a St,
    pub provider: &'a Pr,
    pub config: &'a ProvisionConfig,
    pub owner: &'a Owner,
    pub server: &'a Server,
}

/// Append `message` to the server's diagnostic log and mirror it to tracing.
pub(crate) async fn server_log(
    store: &impl ServerStore,
    server: ServerId,
    message: &str,
) -> Result<()> {
    tracing::info!(server_id = %server, "{message}");
    store.append_log(server, message).await
}
