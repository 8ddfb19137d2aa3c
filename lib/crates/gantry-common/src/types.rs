use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a server record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub u64);

/// Identifier of an owner (user) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default SSH port of a freshly created VM.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Persisted provisioning checkpoint.
///
/// Each value is written just before the phase it names starts, so a
/// stage of `N` means every phase below `N` returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SetupStage {
    #[default]
    NotStarted = 0,
    BaseInstall = 1,
    SshKeys = 2,
    ApplicationInstall = 3,
    PortMigration = 4,
    Complete = 5,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid setup stage {0}: expected 0-5")]
pub struct InvalidStage(pub u8);

impl TryFrom<u8> for SetupStage {
    type Error = InvalidStage;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::NotStarted,
            1 => Self::BaseInstall,
            2 => Self::SshKeys,
            3 => Self::ApplicationInstall,
            4 => Self::PortMigration,
            5 => Self::Complete,
            other => return Err(InvalidStage(other)),
        })
    }
}

impl From<SetupStage> for u8 {
    fn from(stage: SetupStage) -> Self {
        stage as u8
    }
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::BaseInstall => "base install started",
            Self::SshKeys => "ssh keys pending",
            Self::ApplicationInstall => "minecraft and wrapper install started",
            Self::PortMigration => "port migration started",
            Self::Complete => "complete, handoff pending",
        };
        write!(f, "{} ({label})", u8::from(*self))
    }
}

/// A user who owns servers and has provider-registered public keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub email: String,
    /// API token for the cloud provider account holding the owner's keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_token: Option<String>,
}

/// One line of the per-server diagnostic log shown to the owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Game server configuration attached 1:1 to a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Flavour id, `"<script>/<version>"` (e.g. `vanilla/1.8.1`).
    pub flavour: String,
    pub name: String,
    /// Generated credential for the wrapper's local management endpoint.
    pub wrapper_password: String,
    #[serde(default)]
    pub log: Vec<LogEntry>,
}

/// A provisioned (or provisioning) virtual machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub owner_id: OwnerId,
    /// Provider-side VM id; `None` when the VM was never created or is gone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<u64>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub remote_setup_stage: SetupStage,
    /// Comma-separated provider key ids awaiting installation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_keys_pending: Option<String>,
    #[serde(default)]
    pub done_setup: bool,
    /// In-progress operation marker; cleared by a partial reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_operation: Option<String>,
    pub application: ApplicationConfig,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Server {
    /// Pending key ids, with blanks dropped.
    #[must_use]
    pub fn pending_key_ids(&self) -> Vec<String> {
        self.ssh_keys_pending
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }

    /// Port the SSH daemon listens on right now.
    ///
    /// The daemon only moves off 22 once the first-time install finished.
    #[must_use]
    pub fn connect_port(&self) -> u16 {
        if self.done_setup {
            self.ssh_port
        } else {
            DEFAULT_SSH_PORT
        }
    }
}

/// Provisioning snapshot of one server, as shown by `gantry status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub server_id: ServerId,
    pub name: String,
    pub flavour: String,
    pub stage: SetupStage,
    pub done_setup: bool,
    pub ssh_port: u16,
    pub pending_keys: Vec<String>,
    /// An operation was in flight and has not been reset.
    pub in_progress: bool,
    /// Most recent diagnostic log entries, oldest first.
    pub recent_log: Vec<LogEntry>,
}

impl ServerStatus {
    /// Snapshot `server`, keeping at most `log_limit` log entries.
    #[must_use]
    pub fn from_server(server: &Server, log_limit: usize) -> Self {
        let log = &server.application.log;
        let skip = log.len().saturating_sub(log_limit);
        Self {
            server_id: server.id,
            name: server.application.name.clone(),
            flavour: server.application.flavour.clone(),
            stage: server.remote_setup_stage,
            done_setup: server.done_setup,
            ssh_port: server.ssh_port,
            pending_keys: server.pending_key_ids(),
            in_progress: server.pending_operation.is_some(),
            recent_log: log[skip..].to_vec(),
        }
    }
}

/// Result of one background job handled by `gantry provision`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobReport {
    pub job: String,
    pub server_id: ServerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
