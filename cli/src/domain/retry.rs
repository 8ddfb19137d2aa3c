//! Reschedule decision for connectivity timeouts.
//!
//! Linear backoff with a hard cap: the same delay every time, until the
//! attempt counter reaches the policy's ceiling.

use std::time::Duration;

use crate::domain::config::RetryPolicy;

/// What to do after the connectivity probe timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-invoke the whole run later with the given attempt counter.
    Reschedule { attempt: u32, delay: Duration },
    /// Stop trying; the server is marked partial.
    GiveUp,
}

#[must_use]
pub fn decide(policy: &RetryPolicy, attempt: u32) -> RetryDecision {
    if attempt >= policy.max_attempt {
        RetryDecision::GiveUp
    } else {
        RetryDecision::Reschedule {
            attempt: attempt + 1,
            delay: policy.reschedule_delay(),
        }
    }
}
