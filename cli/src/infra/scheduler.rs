//! Infrastructure implementation of the `JobScheduler` port: an in-process
//! delayed job queue.
//!
//! Delays are `tokio::time::sleep` tasks feeding an unbounded channel. An
//! outstanding-job counter lets a one-shot worker stop once every job it
//! caused, including reschedules, has been handled.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use gantry_common::ServerId;
use tokio::sync::mpsc;

use crate::application::ports::{JobScheduler, ProvisionJob};

/// A unit of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Provision(ProvisionJob),
    StartApplication(ServerId),
}

/// Producer half, handed to services as their `JobScheduler`.
#[derive(Clone)]
pub struct TokioJobQueue {
    tx: mpsc::UnboundedSender<Job>,
    outstanding: Arc<AtomicUsize>,
}

/// Consumer half, owned by the worker loop.
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<Job>,
    outstanding: Arc<AtomicUsize>,
}

impl TokioJobQueue {
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outstanding = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                outstanding: Arc::clone(&outstanding),
            },
            JobReceiver { rx, outstanding },
        )
    }

    /// Deliver `job` to the receiver after `delay`.
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver has been dropped.
    pub fn enqueue(&self, job: Job, delay: Duration) -> Result<()> {
        if self.tx.is_closed() {
            return Err(anyhow!("job queue closed"));
        }
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(?job, delay_secs = delay.as_secs(), "job enqueued");
        if delay.is_zero() {
            return self.send(job);
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = queue.send(job) {
                tracing::warn!(?job, error = %err, "dropping delayed job");
            }
        });
        Ok(())
    }

    fn send(&self, job: Job) -> Result<()> {
        self.tx.send(job).map_err(|_| {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            anyhow!("job queue closed")
        })
    }
}

impl JobReceiver {
    /// Wait for the next job, or `None` once nothing is outstanding.
    pub async fn next(&mut self) -> Option<Job> {
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            return None;
        }
        self.rx.recv().await
    }

    /// Mark one received job as handled.
    pub fn complete(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

impl JobScheduler for TokioJobQueue {
    async fn schedule_provision(&self, job: ProvisionJob, delay: Duration) -> Result<()> {
        self.enqueue(Job::Provision(job), delay)
    }

    async fn schedule_start_application(&self, server: ServerId, delay: Duration) -> Result<()> {
        self.enqueue(Job::StartApplication(server), delay)
    }
}
