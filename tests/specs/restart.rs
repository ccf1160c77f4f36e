// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot and replay across a daemon restart.

use crate::prelude::*;
use tl_daemon::{reconcile_state, startup, Config, EnvOverrides};

fn daemon_config(dir: &std::path::Path) -> Config {
    let config = Config::at(dir.to_path_buf());
    std::fs::create_dir_all(&config.state_dir).unwrap();
    std::fs::write(&config.config_path, "notify = \"log\"\n").unwrap();
    config
}

#[tokio::test]
async fn projections_are_rebuilt_from_the_event_log() {
    let w = World::new();
    let run_id = w.manager.start_run(StartRun::new("persist me")).await.unwrap();
    w.manager.wait(&run_id).await.unwrap();
    let run = w.store.get_run(&run_id).await.unwrap().unwrap();
    let steps = w.store.list_steps(&run_id).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json.zst");
    w.store.checkpoint(&path, Utc::now()).unwrap();

    let restored = MemoryStore::restore(&path).unwrap().unwrap();
    assert_eq!(restored.get_run(&run_id).await.unwrap().unwrap(), run);
    assert_eq!(restored.list_steps(&run_id).await.unwrap(), steps);
    assert_eq!(restored.next_seq(&run_id).await.unwrap(), w.store.next_seq(&run_id).await.unwrap());
}

#[tokio::test]
async fn daemon_restart_resumes_interrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = daemon_config(dir.path());

    // First process: a run is mid-flight when the daemon stops.
    let script = dir.path().join("slow-plan.sh");
    std::fs::write(&script, "sleep 5\necho plan-1\n").unwrap();
    std::fs::write(
        &config.config_path,
        format!("notify = \"log\"\n[hooks]\nplan = \"sh {}\"\n", script.display()),
    )
    .unwrap();
    let daemon = startup(&config, &EnvOverrides::default()).await.unwrap();
    let run_id = daemon.manager.start_run(StartRun::new("survive the restart")).await.unwrap();
    daemon.shutdown().await.unwrap();

    // Second process: default hooks finish immediately.
    std::fs::write(&config.config_path, "notify = \"log\"\n").unwrap();
    let daemon = startup(&config, &EnvOverrides::default()).await.unwrap();
    assert_eq!(daemon.store.get_run(&run_id).await.unwrap().unwrap().status, RunStatus::Running);

    let summary = reconcile_state(&daemon).await;
    assert_eq!(summary.resumed_runs, vec![run_id.clone()]);

    let result = daemon.manager.wait(&run_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    let types: Vec<String> =
        daemon.store.list_events(&run_id, 0).await.unwrap().into_iter().map(|e| e.event_type).collect();
    assert!(types.iter().any(|t| t == "run.resumed"));
    daemon.shutdown().await.unwrap();
}
