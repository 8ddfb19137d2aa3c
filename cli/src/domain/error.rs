//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use gantry_common::{OwnerId, ServerId};
use thiserror::Error;

use crate::domain::phase::Phase;

// ── Transport errors ──────────────────────────────────────────────────────────

/// Errors raised by the remote command transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport deadline passed before the operation completed.
    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("could not connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("authentication to {target} failed: {reason}")]
    Authentication { target: String, reason: String },

    #[error("command `{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Errors raised by the provisioning phases themselves.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Server setup (SSH): took too long {}", phase.activity())]
    PhaseTimeout { phase: Phase },
}

// ── Store errors ──────────────────────────────────────────────────────────────

/// A record this run depends on no longer exists.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("server {0} not found")]
    ServerNotFound(ServerId),

    #[error("owner {0} not found")]
    OwnerNotFound(OwnerId),
}

// ── Classification ────────────────────────────────────────────────────────────

/// Returns `true` if any error in the chain is a transport timeout.
#[must_use]
pub fn is_transport_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<TransportError>(),
            Some(TransportError::Timeout { .. })
        )
    })
}

/// Returns `true` if any error in the chain says a record vanished.
#[must_use]
pub fn is_vanished(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<StoreError>().is_some())
}
