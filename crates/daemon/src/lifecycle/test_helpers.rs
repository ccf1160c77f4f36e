// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for lifecycle tests.

pub(super) use super::{reconcile_state, startup, Config, DaemonState, LifecycleError};
pub(super) use crate::config::EnvOverrides;
pub(super) use std::path::Path;
pub(super) use std::time::Duration;
pub(super) use tempfile::{tempdir, TempDir};
pub(super) use tl_core::{
    sources, AutomationInboxEntry, AutomationSpec, Clock, EventKind, InboxStatus, Run, RunEvent, RunId,
    RunMessage, RunStatus, SystemClock, Trigger,
};
pub(super) use tl_engine::{StartRun, INTERRUPTED_ERROR};
pub(super) use tl_storage::{InboxFilter, MemoryStore, Store};

/// Config rooted in a fresh temp dir, with log-only notifications.
pub(super) fn test_config(extra_toml: &str) -> (TempDir, Config) {
    let dir = tempdir().unwrap();
    let config = Config::at(dir.path().to_path_buf());
    std::fs::write(&config.config_path, format!("notify = \"log\"\n{extra_toml}")).unwrap();
    (dir, config)
}

pub(super) async fn start(config: &Config) -> DaemonState {
    startup(config, &EnvOverrides::default()).await.unwrap()
}

/// Write a snapshot holding one run that was mid-flight when the daemon died.
pub(super) async fn write_orphan_snapshot(path: &Path, prompt: &str) -> RunId {
    let store = MemoryStore::new();
    let run_id = store_orphan_run(&store, prompt).await;
    store.checkpoint(path, SystemClock.now()).unwrap();
    run_id
}

/// Store a run that has started but has no control loop.
pub(super) async fn store_orphan_run(store: &MemoryStore, prompt: &str) -> RunId {
    let now = SystemClock.now();
    let run_id = RunId::new();
    store.upsert_run(Run::new(run_id.clone(), prompt, now)).await.unwrap();
    store.append_message(RunMessage::user(run_id.clone(), prompt, now)).await.unwrap();
    store
        .append_event(RunEvent::new(run_id.clone(), EventKind::RunStarted, sources::ORCHESTRATOR).at(now))
        .await
        .unwrap();
    run_id
}

pub(super) fn weekday_spec(name: &str) -> AutomationSpec {
    AutomationSpec {
        name: name.to_string(),
        prompt: format!("{name} prompt"),
        days: vec!["mon".to_string(), "fri".to_string()],
        time_of_day: "09:00".to_string(),
        timezone: "UTC".to_string(),
        enabled: true,
    }
}
