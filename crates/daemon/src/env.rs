// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: TL_STATE_DIR > XDG_STATE_HOME/taskloop > ~/.local/state/taskloop
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("TL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("taskloop"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/taskloop"))
}

fn duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Scheduler poll interval override
pub fn poll_interval() -> Option<Duration> {
    duration_ms("TL_POLL_INTERVAL_MS")
}

/// Run deadline override. `0` disables the deadline.
pub fn run_deadline() -> Option<Duration> {
    duration_ms("TL_RUN_DEADLINE_MS")
}

/// Automation execution lease override
pub fn automation_lease() -> Option<Duration> {
    duration_ms("TL_AUTOMATION_LEASE_MS")
}

/// Snapshot interval (default 60s)
pub fn snapshot_interval() -> Duration {
    duration_ms("TL_SNAPSHOT_INTERVAL_MS").unwrap_or(Duration::from_secs(60))
}

/// Log filter for the daemon (default `info`)
pub fn log_filter() -> String {
    std::env::var("RUST_LOG").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "info".to_string())
}
