//! Connectivity prober: open a session and run a no-op command.

use std::time::Instant;

use anyhow::{Context, Result};

use crate::application::ports::{RemoteConnector, RemoteShell, SshTarget};
use crate::domain::{RemoteCommand, TransportError, is_transport_timeout};

/// Result of a probe that did not fail fatally.
pub enum ProbeOutcome<S> {
    /// The host answered; the session stays open for the rest of the run.
    Reachable(S),
    /// A transport deadline passed. Retryable.
    TimedOut(anyhow::Error),
}

/// Probe `target`, bounded by its `connect_timeout`.
///
/// # Errors
///
/// Returns an error for any failure that is not a transport timeout
/// (refused connection, rejected key, failing no-op command).
pub async fn probe<C: RemoteConnector>(
    connector: &C,
    target: &SshTarget,
) -> Result<ProbeOutcome<C::Session>> {
    let attempt = async {
        let session = connector.open(target).await?;
        session.set_deadline(Some(Instant::now() + target.connect_timeout));
        let noop = session.execute(&RemoteCommand::new("true")).await;
        session.set_deadline(None);
        noop?;
        Ok::<_, anyhow::Error>(session)
    };

    match tokio::time::timeout(target.connect_timeout, attempt).await {
        Ok(Ok(session)) => Ok(ProbeOutcome::Reachable(session)),
        Ok(Err(err)) if is_transport_timeout(&err) => Ok(ProbeOutcome::TimedOut(err)),
        Ok(Err(err)) => {
            Err(err).with_context(|| format!("probing {}:{}", target.host, target.port))
        }
        Err(_) => Ok(ProbeOutcome::TimedOut(
            TransportError::Timeout {
                operation: format!("connecting to {}:{}", target.host, target.port),
            }
            .into(),
        )),
    }
}
