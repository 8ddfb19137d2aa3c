//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `gantry_common` — never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use gantry_common::{Owner, OwnerId, Server, ServerId, SetupStage};
use serde::{Deserialize, Serialize};

use crate::domain::RemoteCommand;

// ── Value Types ───────────────────────────────────────────────────────────────

/// Where and how to open a remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
    /// Deadline for connecting, handshaking and authenticating.
    pub connect_timeout: Duration,
}

/// Cloud VM descriptor as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remote {
    /// Provider-side id; `None` when the VM does not exist.
    pub id: Option<u64>,
    /// Provider-reported diagnostic, set when the lookup failed.
    pub error: Option<String>,
    pub ip_address: Option<IpAddr>,
}

impl Remote {
    #[must_use]
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failed(id: u64, error: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            error: Some(error.into()),
            ip_address: None,
        }
    }
}

/// One unit of work on the job queue: provision `server` for `owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionJob {
    pub owner: OwnerId,
    pub server: ServerId,
    /// Connectivity attempts already spent on this run.
    pub attempt: u32,
}

impl ProvisionJob {
    #[must_use]
    pub fn new(owner: OwnerId, server: ServerId) -> Self {
        Self {
            owner,
            server,
            attempt: 0,
        }
    }
}

/// Management endpoint of the wrapper installed on a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperEndpoint {
    pub host: IpAddr,
    pub port: u16,
    pub username: String,
    pub password: String,
}

// ── Remote Session Ports ──────────────────────────────────────────────────────

/// An open remote shell session.
///
/// Transport deadlines surface as `TransportError::Timeout` somewhere in the
/// returned error chain.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// Run a command; a non-zero exit is a `TransportError::CommandFailed`.
    async fn execute(&self, command: &RemoteCommand) -> Result<()>;
    /// Run a command and report whether it exited zero.
    async fn test(&self, command: &RemoteCommand) -> Result<bool>;
    /// Bound every command issued from now on by `deadline`; `None` lifts
    /// the bound. A command still running at the deadline fails with
    /// `TransportError::Timeout` rather than blocking.
    fn set_deadline(&self, deadline: Option<Instant>);
}

/// Opens remote shell sessions.
#[allow(async_fn_in_trait)]
pub trait RemoteConnector {
    type Session: RemoteShell;

    /// Connect, handshake and authenticate within `target.connect_timeout`.
    async fn open(&self, target: &SshTarget) -> Result<Self::Session>;
}

// ── Entity Store Port ─────────────────────────────────────────────────────────

/// Abstracts the relational store holding owners and servers.
///
/// Loads return `None` for ids that no longer resolve; writes against a
/// vanished record fail with `StoreError`.
#[allow(async_fn_in_trait)]
pub trait ServerStore {
    async fn load_owner(&self, id: OwnerId) -> Result<Option<Owner>>;
    async fn load_server(&self, id: ServerId) -> Result<Option<Server>>;
    async fn set_setup_stage(&self, id: ServerId, stage: SetupStage) -> Result<()>;
    /// Record the final checkpoint and mark first-time setup done, in one
    /// write. From then on the server is reached on its own `ssh_port`.
    async fn complete_setup(&self, id: ServerId) -> Result<()>;
    async fn clear_pending_keys(&self, id: ServerId) -> Result<()>;
    async fn set_flavour(&self, id: ServerId, flavour: &str) -> Result<()>;
    /// Append a line to the server's owner-visible diagnostic log.
    async fn append_log(&self, id: ServerId, message: &str) -> Result<()>;
    /// Clear the in-progress operation marker without touching the record.
    async fn reset_partial(&self, id: ServerId) -> Result<()>;
}

// ── Provider Port ─────────────────────────────────────────────────────────────

/// Abstracts the cloud provider API.
#[allow(async_fn_in_trait)]
pub trait ProviderClient {
    /// Describe the server's VM. Lookup failures are folded into
    /// `Remote::error` rather than returned.
    async fn remote(&self, owner: &Owner, server: &Server) -> Remote;
    /// Resolve one of the owner's registered public keys by id.
    async fn public_key(&self, owner: &Owner, key_id: &str) -> Result<String>;
}

// ── Scheduling Ports ──────────────────────────────────────────────────────────

/// Abstracts the background job queue.
#[allow(async_fn_in_trait)]
pub trait JobScheduler {
    /// Re-enqueue a provisioning run after `delay`.
    async fn schedule_provision(&self, job: ProvisionJob, delay: Duration) -> Result<()>;
    /// Ask for the application process to be started after `delay`.
    async fn schedule_start_application(&self, server: ServerId, delay: Duration) -> Result<()>;
}

/// Abstracts the wrapper's management API.
#[allow(async_fn_in_trait)]
pub trait ApplicationControl {
    async fn start(&self, endpoint: &WrapperEndpoint) -> Result<()>;
}
