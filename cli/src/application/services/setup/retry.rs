//! Retry/reschedule controller for connectivity timeouts.

use anyhow::Result;

use super::orchestrator::ProvisionOutcome;
use super::server_log;
use crate::application::ports::{JobScheduler, ProvisionJob, ServerStore};
use crate::domain::{RetryDecision, RetryPolicy, decide};

/// React to a probe timeout for `job`: reschedule the whole run, or give
/// up and mark the server partial once the attempt ceiling is reached.
///
/// Giving up is an expected outcome and returns `Ok`.
///
/// # Errors
///
/// Returns an error if the store or the scheduler fails.
pub async fn handle_connect_timeout(
    store: &impl ServerStore,
    scheduler: &impl JobScheduler,
    policy: &RetryPolicy,
    job: ProvisionJob,
    cause: &anyhow::Error,
) -> Result<ProvisionOutcome> {
    match decide(policy, job.attempt) {
        RetryDecision::GiveUp => {
            tracing::warn!(server_id = %job.server, attempt = job.attempt, "giving up on SSH");
            server_log(
                store,
                job.server,
                "Error connecting to server; failed to SSH. Aborting",
            )
            .await?;
            store.reset_partial(job.server).await?;
            Ok(ProvisionOutcome::GaveUp)
        }
        RetryDecision::Reschedule { attempt, delay } => {
            server_log(
                store,
                job.server,
                &format!(
                    "Server started, but timed out while trying to SSH (attempt {}, {cause}). \
                     Trying again in {} seconds",
                    job.attempt,
                    delay.as_secs()
                ),
            )
            .await?;
            scheduler
                .schedule_provision(ProvisionJob { attempt, ..job }, delay)
                .await?;
            Ok(ProvisionOutcome::Rescheduled { attempt, delay })
        }
    }
}
