// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with a hard timeout.

use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for activity hook commands
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(600);

/// Exit code a hook uses to request a retry (`EX_TEMPFAIL`)
pub const EX_TEMPFAIL: i32 = 75;

/// Errors from running a subprocess
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{description} timed out after {}s", timeout.as_secs())]
    Timeout { description: String, timeout: Duration },
    #[error("{description} failed to run: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `cmd` to completion, killing it if it outlives `timeout`.
///
/// stdin is closed; stdout and stderr are captured.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Io { description: description.to_string(), source }),
        Err(_) => {
            tracing::warn!(description, timeout_secs = timeout.as_secs(), "subprocess timed out");
            Err(SubprocessError::Timeout { description: description.to_string(), timeout })
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
