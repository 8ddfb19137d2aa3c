//! Unit tests for gantry CLI
//!
//! These tests use recording fakes of every port and run fast without
//! external I/O.

mod handoff_service;
mod key_install;
mod phase_executors;
