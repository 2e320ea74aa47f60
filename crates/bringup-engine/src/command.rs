//! Asynchronous command execution and classification.
//!
//! Every service lifecycle command flows through this module, so the
//! retry/failure policy stays uniform: a "not currently available for
//! execution" result is transient and worth re-issuing; any other
//! failure is a warning unless the caller marks the operation
//! essential. Members of a bulk command list are never retried
//! individually — a partial bulk failure should not restart the batch.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use bringup_api::{ApiResult, CommandRef, CommandStatus, ControlPlane};

use crate::error::{EngineError, EngineResult};
use crate::retry::{Outcome, RetryPolicy};

/// Control-plane message for a command issued before the entity is
/// ready to accept it.
pub const NOT_AVAILABLE_MARKER: &str = "is not currently available for execution";

/// Control-plane message for a start issued while one is in flight.
pub const ALREADY_PENDING_MARKER: &str = "There is already a pending command on this entity";

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wait for a command to resolve, polling its status up to `timeout`.
///
/// Returns the last observed status; on timeout the command is still
/// `active` with `success == None`, which callers treat as failure.
pub async fn wait<C: ControlPlane>(
    api: &C,
    cmd: &CommandRef,
    timeout: Duration,
) -> EngineResult<CommandStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        let status = api.command_status(cmd.id).await?;
        if !status.active {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            debug!(command = %cmd.name, "command wait timed out");
            return Ok(status);
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Issue a single command and wait for it, re-issuing under `policy`
/// while the control plane reports it as not yet available.
///
/// Non-transient failures are logged and swallowed unless `essential`.
pub async fn run_retrying<C, F, Fut>(
    api: &C,
    policy: RetryPolicy,
    timeout: Duration,
    fail_msg: &str,
    essential: bool,
    spawn: F,
) -> EngineResult<()>
where
    C: ControlPlane,
    F: Fn() -> Fut,
    Fut: Future<Output = ApiResult<CommandRef>>,
{
    let spawn = &spawn;
    policy
        .run(|| async move {
            let cmd = match spawn().await {
                Ok(cmd) => cmd,
                Err(err) => return Outcome::Fatal(err.into()),
            };
            let status = match wait(api, &cmd, timeout).await {
                Ok(status) => status,
                Err(err) => return Outcome::Fatal(err),
            };
            if status.succeeded() {
                return Outcome::Done(());
            }

            let message = status.message().to_string();
            if message.contains(NOT_AVAILABLE_MARKER) {
                return Outcome::Transient(EngineError::CommandFailed {
                    name: cmd.name,
                    message,
                });
            }

            warn!(command = %cmd.name, %message, "{}", fail_msg);
            if essential {
                Outcome::Fatal(EngineError::CommandFailed {
                    name: cmd.name,
                    message,
                })
            } else {
                Outcome::Done(())
            }
        })
        .await
}

/// Wait for every member of a bulk command list; failures are logged
/// and never retried.
pub async fn run_bulk<C: ControlPlane>(
    api: &C,
    cmds: Vec<CommandRef>,
    timeout: Duration,
    fail_msg: &str,
) -> EngineResult<()> {
    for cmd in cmds {
        let status = wait(api, &cmd, timeout).await?;
        if !status.succeeded() {
            warn!(command = %cmd.name, message = %status.message(), "{}", fail_msg);
        }
    }
    Ok(())
}
