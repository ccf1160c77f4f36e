// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use tl_adapters::ScriptActivityAdapter;
use tl_core::SystemClock;
use tl_engine::{AutomationScheduler, EventBroker, RunManager};
use tl_storage::MemoryStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{EnvOverrides, FileConfig, Settings};
use crate::notify::DaemonNotifier;

use super::{Config, DaemonScheduler, DaemonState, LifecycleError};

/// Start the daemon
pub async fn startup(config: &Config, env: &EnvOverrides) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config, env).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock;
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config, env: &EnvOverrides) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Open without truncating so a running daemon's PID survives a failed attempt.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::write(&config.version_path, crate::env::VERSION)?;

    // 3. Settings: taskloop.toml, then environment overrides
    let file = FileConfig::load(&config.config_path)?;
    let settings = Settings::resolve(file, env, &config.state_dir);

    // 4. Load store from snapshot (projections are rebuilt by replay)
    let store = match MemoryStore::restore(&config.snapshot_path)? {
        Some(store) => store,
        None => {
            info!("No snapshot found, starting with empty state");
            MemoryStore::new()
        }
    };
    let store = Arc::new(store);

    // 5. Engine
    let mut activities = ScriptActivityAdapter::new(settings.hooks.clone());
    if let Some(workdir) = &settings.workdir {
        std::fs::create_dir_all(workdir)?;
        activities = activities.with_cwd(workdir.clone());
    }
    let manager =
        RunManager::new(Arc::clone(&store), EventBroker::default(), activities, SystemClock, settings.run.clone());
    let scheduler = AutomationScheduler::new(
        Arc::clone(&store),
        manager.clone(),
        DaemonNotifier::new(settings.notify),
        SystemClock,
        settings.scheduler.clone(),
    );

    // 6. Seed automations from config
    sync_seeds(&scheduler, &settings).await;

    info!(
        state_dir = %config.state_dir.display(),
        poll_interval_ms = settings.scheduler.poll_interval.as_millis() as u64,
        "Daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        settings,
        lock_file,
        store,
        manager,
        scheduler,
        stop: CancellationToken::new(),
        start_time: Instant::now(),
        tasks: Vec::new(),
    })
}

/// Create or update each configured automation. Invalid seeds are skipped.
async fn sync_seeds(scheduler: &DaemonScheduler, settings: &Settings) {
    for spec in &settings.automations {
        match scheduler.sync_automation(spec).await {
            Ok(automation) => {
                info!(automation_id = %automation.id, name = %automation.name, "synced seed automation")
            }
            Err(e) => warn!(name = %spec.name, error = %e, "skipping invalid seed automation"),
        }
    }
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
