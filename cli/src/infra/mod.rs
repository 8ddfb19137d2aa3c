//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the SSH transport, the
//! provider and wrapper HTTP clients, the on-disk store, configuration
//! loading, and the in-process job queue.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod config;
pub mod provider;
pub mod scheduler;
pub mod ssh;
pub mod store;
pub mod wrapper;
