//! `gantry provision` — run a provisioning job and its follow-ups.
//!
//! The job queue lives in this process: reschedules and the delayed
//! application start are handled here until nothing is outstanding.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use gantry_common::{JobReport, OwnerId, ServerId};

use crate::app::AppContext;
use crate::application::ports::{
    ApplicationControl, ProviderClient, ProvisionJob, RemoteConnector, ServerStore,
};
use crate::application::services::handoff::{StartOutcome, start_application};
use crate::application::services::setup::{ProvisionOutcome, SetupServices, provision_server};
use crate::domain::ProvisionConfig;
use crate::infra::provider::DigitalOceanClient;
use crate::infra::scheduler::{Job, JobReceiver, TokioJobQueue};
use crate::infra::ssh::Ssh2Connector;
use crate::infra::wrapper::WrapperClient;
use crate::output::{Tone, json};

#[derive(Args)]
pub struct ProvisionArgs {
    /// Owner id
    #[arg(long)]
    pub owner: u64,

    /// Server id
    #[arg(long)]
    pub server: u64,

    /// Connectivity attempts already spent
    #[arg(long, default_value_t = 0)]
    pub attempt: u32,
}

/// Run the provision command.
///
/// # Errors
///
/// Returns an error if the HTTP clients cannot be built or the queue is
/// closed. Job failures are reported, not returned.
pub async fn run(app: &AppContext, args: &ProvisionArgs) -> Result<ExitCode> {
    let provider = DigitalOceanClient::new(&app.config.provider.api_url)?;
    let wrapper = WrapperClient::new()?;
    let (queue, mut receiver) = TokioJobQueue::new();

    let job = ProvisionJob {
        owner: OwnerId(args.owner),
        server: ServerId(args.server),
        attempt: args.attempt,
    };
    queue.enqueue(Job::Provision(job), Duration::ZERO)?;

    let worker = Worker {
        store: &app.store,
        provider: &provider,
        connector: &Ssh2Connector,
        control: &wrapper,
        queue: &queue,
        config: &app.config,
    };
    let reports = tokio::select! {
        reports = worker.drain(&mut receiver) => reports,
        _ = tokio::signal::ctrl_c() => {
            app.output.emit(Tone::Pending, "Interrupted; outstanding jobs were dropped");
            return Ok(ExitCode::from(130));
        }
    };

    if app.is_json() {
        json::print(&reports)?;
    } else {
        app.human().render_reports(&reports);
    }
    if reports.iter().any(|r| r.error.is_some()) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Handles jobs from the in-process queue.
pub struct Worker<'a, St, Pr, Co, Ap> {
    pub store: &'a St,
    pub provider: &'a Pr,
    pub connector: &'a Co,
    pub control: &'a Ap,
    pub queue: &'a TokioJobQueue,
    pub config: &'a ProvisionConfig,
}

impl<St, Pr, Co, Ap> Worker<'_, St, Pr, Co, Ap>
where
    St: ServerStore,
    Pr: ProviderClient,
    Co: RemoteConnector,
    Ap: ApplicationControl,
{
    /// Handle jobs until nothing is outstanding.
    pub async fn drain(&self, receiver: &mut JobReceiver) -> Vec<JobReport> {
        let mut reports = Vec::new();
        while let Some(job) = receiver.next().await {
            reports.push(self.handle(job).await);
            receiver.complete();
        }
        reports
    }

    async fn handle(&self, job: Job) -> JobReport {
        match job {
            Job::Provision(job) => {
                let svc = SetupServices {
                    store: self.store,
                    provider: self.provider,
                    connector: self.connector,
                    scheduler: self.queue,
                    config: self.config,
                };
                let result = provision_server(&svc, job).await;
                report("provision", job.server, Some(job.attempt), result.map(provision_label))
            }
            Job::StartApplication(server) => {
                let result =
                    start_application(self.store, self.provider, self.control, self.config, server)
                        .await;
                report("start", server, None, result.map(start_label))
            }
        }
    }
}

fn report(job: &str, server: ServerId, attempt: Option<u32>, result: Result<&str>) -> JobReport {
    let (outcome, error) = match result {
        Ok(outcome) => (outcome.to_string(), None),
        Err(err) => ("failed".to_string(), Some(format!("{err:#}"))),
    };
    JobReport {
        job: job.to_string(),
        server_id: server,
        attempt,
        outcome,
        error,
    }
}

fn provision_label(outcome: ProvisionOutcome) -> &'static str {
    match outcome {
        ProvisionOutcome::Completed { .. } => "completed",
        ProvisionOutcome::Rescheduled { .. } => "rescheduled",
        ProvisionOutcome::GaveUp => "gave up",
        ProvisionOutcome::Aborted => "aborted",
        ProvisionOutcome::Vanished => "vanished",
    }
}

fn start_label(outcome: StartOutcome) -> &'static str {
    match outcome {
        StartOutcome::Started => "started",
        StartOutcome::Unreachable => "unreachable",
        StartOutcome::Vanished => "vanished",
    }
}
