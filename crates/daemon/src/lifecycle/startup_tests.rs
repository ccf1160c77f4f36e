// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::test_helpers::*;

#[tokio::test]
async fn startup_writes_pid_and_version_files() {
    let (_dir, config) = test_config("");
    let daemon = start(&config).await;

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert_eq!(std::fs::read_to_string(&config.version_path).unwrap(), crate::env::VERSION);

    daemon.shutdown().await.unwrap();
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_existing_files() {
    let (_dir, config) = test_config("");
    std::fs::write(&config.version_path, b"0.1.0").unwrap();

    // Hold an exclusive lock (simulating the running daemon)
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    use fs2::FileExt;
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    match startup(&config, &EnvOverrides::default()).await {
        Err(LifecycleError::LockFailed(_)) => {}
        Err(e) => panic!("expected LockFailed, got: {e}"),
        Ok(_) => panic!("expected LockFailed, but startup succeeded"),
    }

    assert!(config.version_path.exists(), "version file must not be deleted on LockFailed");
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), "12345");
}

#[tokio::test]
async fn invalid_config_fails_and_cleans_up() {
    let (_dir, config) = test_config("[scheduler]\npoll_every = 3\n");

    match startup(&config, &EnvOverrides::default()).await {
        Err(LifecycleError::Config { path, .. }) => assert_eq!(path, config.config_path),
        Err(e) => panic!("expected Config, got: {e}"),
        Ok(_) => panic!("expected Config error, but startup succeeded"),
    }
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}

#[tokio::test]
async fn seed_automations_sync_by_name_across_restarts() {
    let seeds = r#"
[[automation]]
name = "standup"
prompt = "collect updates"
time_of_day = "09:00"

[[automation]]
name = "broken"
prompt = "never valid"
time_of_day = "noon"
"#;
    let (_dir, config) = test_config(seeds);

    let daemon = start(&config).await;
    let first = daemon.scheduler.list_automations().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "standup");
    daemon.shutdown().await.unwrap();

    std::fs::write(
        &config.config_path,
        "notify = \"log\"\n[[automation]]\nname = \"standup\"\nprompt = \"collect blockers\"\ntime_of_day = \"10:00\"\n",
    )
    .unwrap();
    let daemon = start(&config).await;
    let second = daemon.scheduler.list_automations().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].prompt, "collect blockers");
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn finished_runs_survive_restart() {
    let (_dir, config) = test_config("");
    let daemon = start(&config).await;
    let run_id = daemon.manager.start_run(StartRun::new("remember me")).await.unwrap();
    daemon.manager.wait(&run_id).await.unwrap();
    let events_before = daemon.store.list_events(&run_id, 0).await.unwrap();
    daemon.shutdown().await.unwrap();

    let daemon = start(&config).await;
    let run = daemon.store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(daemon.store.list_events(&run_id, 0).await.unwrap(), events_before);
    assert!(!daemon.store.list_steps(&run_id).await.unwrap().is_empty());
    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn workdir_is_created_under_state_dir() {
    let (_dir, config) = test_config("workdir = \"hooks\"\n");
    let daemon = start(&config).await;
    assert!(config.state_dir.join("hooks").is_dir());
    daemon.shutdown().await.unwrap();
}
