//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod phase;
pub mod retry;
pub mod shell;

pub use config::{FlavourInfo, ProvisionConfig, RetryPolicy};
pub use error::{ProvisionError, StoreError, TransportError, is_transport_timeout, is_vanished};
pub use phase::{Phase, SetupBranch, StagePolicy};
pub use retry::{RetryDecision, decide};
pub use shell::{RemoteCommand, shell_escape};
