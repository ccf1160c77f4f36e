// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tl_adapters::{ActivityKind, FakeActivityAdapter};
use tl_core::test_support::ts;
use tl_core::{AutomationId, FakeClock, RunPhase};
use tl_storage::MemoryStore;

type TestManager = RunManager<MemoryStore, FakeActivityAdapter, FakeClock>;

fn config() -> RunConfig {
    RunConfig { retry: RetryPolicy::immediate(3), deadline: Some(Duration::from_secs(30)) }
}

fn setup_with(config: RunConfig) -> (TestManager, FakeActivityAdapter, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let adapter = FakeActivityAdapter::new();
    let manager =
        RunManager::new(Arc::clone(&store), EventBroker::default(), adapter.clone(), FakeClock::at(ts(0)), config);
    (manager, adapter, store)
}

fn setup() -> (TestManager, FakeActivityAdapter, Arc<MemoryStore>) {
    setup_with(config())
}

/// A run row with a `run.started` event but no control loop.
async fn orphan(store: &MemoryStore) -> RunId {
    let run_id = RunId::new();
    store.upsert_run(Run::new(run_id.clone(), "left behind", ts(0))).await.unwrap();
    store.append_message(RunMessage::user(run_id.clone(), "left behind", ts(0))).await.unwrap();
    store
        .append_event(RunEvent::new(run_id.clone(), EventKind::RunStarted, sources::ORCHESTRATOR).at(ts(0)))
        .await
        .unwrap();
    run_id
}

#[tokio::test]
async fn start_run_completes_and_records_prompt() {
    let (manager, _, store) = setup();
    let automation_id = AutomationId::new();

    let run_id =
        manager.start_run(StartRun::for_automation("ship it", automation_id.clone())).await.unwrap();
    let result = manager.wait(&run_id).await.unwrap();

    assert_eq!(result, RunResult::new(RunStatus::Completed, CompletionReason::Verified));
    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.automation_id, Some(automation_id));
    assert_eq!(run.prompt, "ship it");

    let messages = store.list_messages(&run_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "ship it");
    assert!(!manager.is_active(&run_id));
}

#[tokio::test]
async fn outcome_reports_phase_and_diagnostics() {
    let (manager, adapter, _) = setup();
    let mut verdict = tl_adapters::VerifyOutput::new("partial", "");
    verdict.diagnostics = vec!["lint warnings".into()];
    adapter.push_verify_result(Ok(verdict));

    let run_id = manager.start_run(StartRun::new("go")).await.unwrap();
    let outcome = manager.outcome(&run_id).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Partial);
    assert_eq!(outcome.phase, RunPhase::Completed);
    assert_eq!(outcome.completion_reason, CompletionReason::PartiallyVerified);
    assert_eq!(outcome.diagnostics, vec!["lint warnings".to_string()]);
}

#[tokio::test]
async fn signal_message_to_finished_run_is_rejected() {
    let (manager, _, _) = setup();
    let run_id = manager.start_run(StartRun::new("go")).await.unwrap();
    manager.wait(&run_id).await.unwrap();

    let err = manager.signal_message(&run_id, "more").await.unwrap_err();
    assert!(matches!(err, RunError::Terminal(id) if id == run_id));
}

#[tokio::test]
async fn signal_message_to_unknown_run_is_not_found() {
    let (manager, _, _) = setup();
    let err = manager.signal_message(&RunId::new(), "hi").await.unwrap_err();
    assert!(matches!(err, RunError::NotFound(_)));
}

#[tokio::test]
async fn signal_message_to_orphan_requires_resume() {
    let (manager, _, store) = setup();
    let run_id = orphan(&store).await;

    let err = manager.signal_message(&run_id, "hi").await.unwrap_err();
    assert!(matches!(err, RunError::NotActive(_)));
}

#[tokio::test]
async fn empty_prompt_waits_for_first_message() {
    let (manager, adapter, store) = setup();
    let run_id = manager.start_run(StartRun::new("")).await.unwrap();
    assert!(store.list_messages(&run_id).await.unwrap().is_empty());

    manager.signal_message(&run_id, "now do it").await.unwrap();
    let result = manager.wait(&run_id).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(adapter.calls_mentioning("now do it"), 3);
}

#[tokio::test]
async fn cancel_finished_run_is_noop() {
    let (manager, _, store) = setup();
    let run_id = manager.start_run(StartRun::new("go")).await.unwrap();
    manager.wait(&run_id).await.unwrap();
    let before = store.list_events(&run_id, 0).await.unwrap().len();

    manager.cancel_run(&run_id).await.unwrap();
    manager.cancel_run(&run_id).await.unwrap();

    assert_eq!(store.list_events(&run_id, 0).await.unwrap().len(), before);
    assert_eq!(store.get_run(&run_id).await.unwrap().unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn cancel_orphan_appends_substrate_event() {
    let (manager, _, store) = setup();
    let run_id = orphan(&store).await;

    manager.cancel_run(&run_id).await.unwrap();

    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.completion_reason, Some(CompletionReason::UserCancelled));
    let events = store.list_events(&run_id, 0).await.unwrap();
    assert_eq!(events.last().map(|e| e.source.as_str()), Some(sources::SUBSTRATE));
}

#[tokio::test]
async fn cancel_orphan_racing_failure_stores_one_terminal_event() {
    let (manager, _, store) = setup();
    let run_id = orphan(&store).await;

    let failure = manager.inner.fail_from_substrate(&run_id, CompletionReason::Timeout, "run deadline exceeded");
    let (cancelled, failed) = tokio::join!(manager.cancel_run(&run_id), failure);
    cancelled.unwrap();

    let events = store.list_events(&run_id, 0).await.unwrap();
    let terminal: Vec<&RunEvent> = events.iter().filter(|e| e.kind().is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.result(), Some(failed));
}

#[tokio::test]
async fn cancel_live_run_reaches_loop() {
    let (manager, adapter, _) = setup();
    let gate = adapter.gate(ActivityKind::Plan);
    let run_id = manager.start_run(StartRun::new("go")).await.unwrap();

    gate.entered().await;
    manager.cancel_run(&run_id).await.unwrap();
    gate.release(1);

    assert_eq!(manager.wait(&run_id).await.unwrap(), RunResult::cancelled());
    assert!(adapter.calls_of(ActivityKind::Execute).is_empty());
}

#[tokio::test]
async fn hello_cancel_goodbye_never_reaches_goodbye() {
    let (manager, adapter, _) = setup();
    let gate = adapter.gate(ActivityKind::Plan);
    let run_id = manager.start_run(StartRun::new("")).await.unwrap();

    manager.signal_message(&run_id, "hello").await.unwrap();
    gate.entered().await;
    manager.cancel_run(&run_id).await.unwrap();
    manager.signal_message(&run_id, "goodbye").await.unwrap();
    gate.release(1);

    let result = manager.wait(&run_id).await.unwrap();
    assert_eq!(result, RunResult::new(RunStatus::Cancelled, CompletionReason::UserCancelled));
    assert_eq!(adapter.calls_mentioning("goodbye"), 0);
}

#[tokio::test]
async fn resume_active_run_conflicts() {
    let (manager, adapter, store) = setup();
    let gate = adapter.gate(ActivityKind::Plan);
    let run_id = manager.start_run(StartRun::new("go")).await.unwrap();
    gate.entered().await;

    let err = manager.resume_run(&run_id, None).await.unwrap_err();
    assert!(matches!(err, RunError::Conflict(_)));
    let err = manager.resume_run(&run_id, Some("sneaky")).await.unwrap_err();
    assert!(matches!(err, RunError::Conflict(_)));

    let messages = store.list_messages(&run_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "go");

    gate.release(1);
    manager.wait(&run_id).await.unwrap();
}

#[tokio::test]
async fn resume_finished_run_replays_last_message() {
    let (manager, adapter, store) = setup();
    adapter.push_execute_result(Err(tl_adapters::ActivityError::Terminal("flaky".into())));
    let run_id = manager.start_run(StartRun::new("original ask")).await.unwrap();
    assert_eq!(manager.wait(&run_id).await.unwrap().status, RunStatus::Failed);
    let checkpoint = store.get_run(&run_id).await.unwrap().unwrap().checkpoint_seq;

    manager.resume_run(&run_id, None).await.unwrap();
    let result = manager.wait(&run_id).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(adapter.calls_mentioning("original ask"), 5);

    let resumed: Vec<RunEvent> = store
        .list_events(&run_id, 0)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.kind() == EventKind::RunResumed)
        .collect();
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].payload_u64("resumed_from"), Some(checkpoint));
    assert_eq!(resumed[0].payload_str("previous_status"), Some("failed"));
    assert_eq!(resumed[0].payload_str("previous_reason"), Some("activity_error"));
    assert_eq!(store.get_run(&run_id).await.unwrap().unwrap().resumed_from, Some(checkpoint));
}

#[tokio::test]
async fn resume_with_new_message_uses_it() {
    let (manager, adapter, store) = setup();
    let run_id = manager.start_run(StartRun::new("first")).await.unwrap();
    manager.wait(&run_id).await.unwrap();

    manager.resume_run(&run_id, Some("second")).await.unwrap();
    manager.wait(&run_id).await.unwrap();

    assert_eq!(adapter.calls_mentioning("second"), 3);
    assert_eq!(store.list_messages(&run_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn resume_unknown_run_is_not_found() {
    let (manager, _, _) = setup();
    assert!(matches!(manager.resume_run(&RunId::new(), None).await, Err(RunError::NotFound(_))));
}

#[tokio::test]
async fn recover_resumes_orphaned_running_runs() {
    let (manager, adapter, store) = setup();
    let run_id = orphan(&store).await;

    let recovered = manager.recover().await.unwrap();
    assert_eq!(recovered, vec![run_id.clone()]);

    let result = manager.wait(&run_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(adapter.calls_mentioning("left behind"), 3);
}

#[tokio::test]
async fn recover_skips_finished_runs() {
    let (manager, _, _) = setup();
    let run_id = manager.start_run(StartRun::new("go")).await.unwrap();
    manager.wait(&run_id).await.unwrap();

    assert!(manager.recover().await.unwrap().is_empty());
}

#[tokio::test]
async fn deadline_fails_run_with_timeout() {
    let (manager, adapter, store) =
        setup_with(RunConfig { retry: RetryPolicy::immediate(1), deadline: Some(Duration::from_millis(50)) });
    let _gate = adapter.gate(ActivityKind::Execute);

    let run_id = manager.start_run(StartRun::new("slow")).await.unwrap();
    let result = manager.wait(&run_id).await.unwrap();

    assert_eq!(result, RunResult::failed(CompletionReason::Timeout));
    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.completion_reason, Some(CompletionReason::Timeout));
    let last = store.list_events(&run_id, 0).await.unwrap().pop().unwrap();
    assert_eq!(last.source, sources::SUBSTRATE);
}

#[tokio::test]
async fn subscriber_sees_live_events_through_terminal() {
    let (manager, adapter, _) = setup();
    let gate = adapter.gate(ActivityKind::Plan);
    let run_id = manager.start_run(StartRun::new("go")).await.unwrap();
    let mut sub = manager.subscribe(&run_id, CancellationToken::new());
    gate.release(1);

    let mut last_seq = 0;
    loop {
        let event = sub.recv().await.unwrap();
        assert!(event.seq > last_seq);
        last_seq = event.seq;
        if event.kind().is_terminal() {
            assert_eq!(event.kind(), EventKind::RunCompleted);
            break;
        }
    }
}

#[tokio::test]
async fn wait_unknown_run_is_not_found() {
    let (manager, _, _) = setup();
    assert!(matches!(manager.wait(&RunId::new()).await, Err(RunError::NotFound(_))));
}

#[tokio::test]
async fn launcher_trait_delegates_to_manager() {
    let (manager, _, _) = setup();
    let run_id = RunLauncher::launch(&manager, StartRun::new("via trait")).await.unwrap();
    let outcome = manager.wait_outcome(&run_id).await.unwrap();
    assert_eq!(outcome.run_id, run_id);
    assert_eq!(outcome.status, RunStatus::Completed);
}
