//! Bounded retry with delay.
//!
//! The single retry primitive for every control-plane interaction that
//! can transiently fail or report "not yet ready". Operations classify
//! their own outcome; the policy is mechanism only and knows nothing
//! about the domain.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Classified outcome of one attempt.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation completed; stop retrying.
    Done(T),
    /// Worth retrying after the policy delay. The final attempt's
    /// error propagates unmodified.
    Transient(EngineError),
    /// Propagate immediately without consuming a retry.
    Fatal(EngineError),
}

/// Bounded retry-with-delay policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Drive `op` until it completes, fails fatally, or exhausts the
    /// attempt budget.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Outcome::Done(value) => return Ok(value),
                Outcome::Fatal(err) => return Err(err),
                Outcome::Transient(err) => {
                    if attempt == attempts {
                        return Err(err);
                    }
                    debug!(attempt, of = attempts, error = %err, "transient failure, retrying");
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
        unreachable!("retry loop returns on the final attempt");
    }
}

/// Per-operation retry policies.
///
/// Historical versions of this workflow disagreed on exact counts and
/// timeouts; they are explicit configuration here rather than constants
/// scattered through call sites.
#[derive(Debug, Clone, Copy)]
pub struct RetryTunings {
    /// Parcel lookup after widening the repository list.
    pub parcel_validate: RetryPolicy,
    /// Parcel stage polling (download/distribute/activate).
    pub parcel_poll: RetryPolicy,
    /// Host inspection command polling.
    pub host_inspect: RetryPolicy,
    /// Generic service init command execution.
    pub command: RetryPolicy,
    /// Service start (the control plane retries internally too).
    pub service_start: RetryPolicy,
    /// Upper bound on a single command wait.
    pub command_timeout: Duration,
}

impl Default for RetryTunings {
    fn default() -> Self {
        Self {
            parcel_validate: RetryPolicy::new(3, Duration::from_secs(5)),
            parcel_poll: RetryPolicy::new(20, Duration::from_secs(30)),
            host_inspect: RetryPolicy::new(20, Duration::from_secs(5)),
            command: RetryPolicy::new(3, Duration::from_secs(30)),
            service_start: RetryPolicy::new(3, Duration::from_secs(60)),
            command_timeout: Duration::from_secs(300),
        }
    }
}

impl RetryTunings {
    /// Zero-delay variant used by tests.
    pub fn immediate() -> Self {
        Self {
            parcel_validate: RetryPolicy::new(3, Duration::ZERO),
            parcel_poll: RetryPolicy::new(20, Duration::ZERO),
            host_inspect: RetryPolicy::new(20, Duration::ZERO),
            command: RetryPolicy::new(3, Duration::ZERO),
            service_start: RetryPolicy::new(3, Duration::ZERO),
            command_timeout: Duration::from_secs(300),
        }
    }
}
