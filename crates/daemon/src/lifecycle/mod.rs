// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod reconcile;
mod startup;
pub use reconcile::{reconcile_state, ReconcileSummary};
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tl_adapters::ScriptActivityAdapter;
use tl_core::{Clock, SystemClock};
use tl_engine::{AutomationScheduler, RunManager};
use tl_storage::MemoryStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Settings;
use crate::notify::DaemonNotifier;

/// Run manager with the daemon's concrete adapters
pub type DaemonManager = RunManager<MemoryStore, ScriptActivityAdapter, SystemClock>;

/// Scheduler launching runs through [`DaemonManager`]
pub type DaemonScheduler = AutomationScheduler<MemoryStore, DaemonManager, DaemonNotifier, SystemClock>;

/// Daemon file layout
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/taskloop)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Directory for daily-rotated daemon logs
    pub log_dir: PathBuf,
    /// Path to snapshot file
    pub snapshot_path: PathBuf,
    /// Path to the optional `taskloop.toml`
    pub config_path: PathBuf,
}

impl Config {
    /// Load paths for the user-level daemon.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::at(crate::env::state_dir()?))
    }

    /// Paths rooted at `state_dir`.
    pub fn at(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_dir: state_dir.join("logs"),
            snapshot_path: state_dir.join("snapshot.json.zst"),
            config_path: state_dir.join("taskloop.toml"),
            state_dir,
        }
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    pub settings: Settings,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub store: Arc<MemoryStore>,
    pub manager: DaemonManager,
    pub scheduler: DaemonScheduler,
    /// Cancelled on shutdown; stops the background loops
    pub stop: CancellationToken,
    pub start_time: Instant,
    tasks: Vec<JoinHandle<()>>,
}

impl DaemonState {
    /// Spawn the scheduler poll loop and the periodic snapshot writer.
    pub fn spawn_background(&mut self, snapshot_interval: Duration) {
        let scheduler = self.scheduler.clone();
        let token = self.stop.clone();
        self.tasks.push(tokio::spawn(async move { scheduler.run_poll_loop(token).await }));

        let store = Arc::clone(&self.store);
        let path = self.config.snapshot_path.clone();
        let token = self.stop.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(snapshot_interval.max(Duration::from_millis(100)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = store.checkpoint(&path, SystemClock.now()) {
                            warn!(error = %e, "periodic snapshot failed");
                        }
                    }
                }
            }
        }));
    }

    /// Write a snapshot of the store now.
    pub fn checkpoint(&self) -> Result<(), LifecycleError> {
        self.store.checkpoint(&self.config.snapshot_path, SystemClock.now())?;
        Ok(())
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Runs still in flight are left `running` in the snapshot; the next
    /// startup resumes them from their last user message.
    pub async fn shutdown(mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop background loops
        self.stop.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "background task failed");
            }
        }

        // 2. Save final snapshot so the next startup sees everything
        if let Err(e) = self.checkpoint() {
            warn!(error = %e, "failed to save shutdown snapshot");
        }

        // 3. Remove PID and version files
        for path in [&self.config.lock_path, &self.config.version_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove daemon file");
                }
            }
        }

        // 4. Lock file is released automatically when self.lock_file is dropped

        info!(uptime_secs = self.start_time.elapsed().as_secs(), "Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Store error: {0}")]
    Store(#[from] tl_storage::StoreError),

    #[error("Run error: {0}")]
    Run(#[from] tl_engine::RunError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tl_engine::SchedulerError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
