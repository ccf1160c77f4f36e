// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run control loop scenarios.

use crate::prelude::*;

#[tokio::test]
async fn hello_then_cancel_then_goodbye() {
    let w = World::new();
    let gate = w.adapter.gate(ActivityKind::Plan);
    let run_id = w.manager.start_run(StartRun::new("")).await.unwrap();

    w.manager.signal_message(&run_id, "hello").await.unwrap();
    gate.entered().await;
    w.manager.cancel_run(&run_id).await.unwrap();
    w.manager.signal_message(&run_id, "goodbye").await.unwrap();
    gate.release(1);

    let result = w.manager.wait(&run_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.completion_reason, CompletionReason::UserCancelled);
    assert_eq!(w.adapter.calls_mentioning("hello"), 1);
    assert_eq!(w.adapter.calls_mentioning("goodbye"), 0);

    let types = w.event_types(&run_id).await;
    assert_eq!(types.last().map(String::as_str), Some("run.cancelled"));

    let err = w.manager.signal_message(&run_id, "too late").await.unwrap_err();
    assert!(matches!(err, RunError::Terminal(_)));
}

#[tokio::test]
async fn execute_failure_fails_run_with_prefixed_error() {
    let w = World::new();
    w.adapter.push_execute_result(Err(ActivityError::Terminal("disk full".into())));

    let run_id = w.manager.start_run(StartRun::new("build it")).await.unwrap();
    let result = w.manager.wait(&run_id).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.completion_reason, CompletionReason::ActivityError);
    assert!(w.adapter.calls_of(ActivityKind::Verify).is_empty());
    assert_eq!(w.adapter.calls_mentioning("execution: disk full"), 1);

    let failed: Vec<_> =
        w.events(&run_id).await.into_iter().filter(|e| e.kind() == EventKind::RunFailed).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].payload_str("error"), Some("execution: disk full"));
}

#[tokio::test]
async fn cancel_before_any_activity() {
    let w = World::new();
    let gate = w.adapter.gate(ActivityKind::Plan);
    let run_id = w.manager.start_run(StartRun::new("")).await.unwrap();

    // No message yet: the loop is idle and no activity has started.
    w.manager.cancel_run(&run_id).await.unwrap();
    let result = w.manager.wait(&run_id).await.unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(w.adapter.calls().is_empty());
    assert!(w.store.list_steps(&run_id).await.unwrap().is_empty());
    gate.release(1);
}

#[tokio::test]
async fn new_message_supersedes_cycle_in_flight() {
    let w = World::new();
    let gate = w.adapter.gate(ActivityKind::Plan);
    let run_id = w.manager.start_run(StartRun::new("first idea")).await.unwrap();

    gate.entered().await;
    w.manager.signal_message(&run_id, "better idea").await.unwrap();
    gate.release(2);

    let result = w.manager.wait(&run_id).await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(w.adapter.calls_mentioning("first idea"), 1);
    assert_eq!(w.adapter.calls_mentioning("better idea"), 3);

    let types = w.event_types(&run_id).await;
    assert!(types.iter().any(|t| t == "step.superseded"));
    assert_eq!(types.last().map(String::as_str), Some("run.completed"));
}

#[tokio::test]
async fn subscriber_sees_gap_free_sequence() {
    let w = World::new();
    let gate = w.adapter.gate(ActivityKind::Plan);
    let run_id = w.manager.start_run(StartRun::new("watch me")).await.unwrap();
    let mut sub = w.manager.subscribe(&run_id, CancellationToken::new());
    gate.release(1);

    let mut seen = Vec::new();
    while let Some(event) = sub.recv().await {
        let terminal = event.kind().is_terminal();
        seen.push(event.seq);
        if terminal {
            break;
        }
    }

    let stored: Vec<u64> = w.events(&run_id).await.iter().map(|e| e.seq).collect();
    assert!(seen.windows(2).all(|pair| pair[1] == pair[0] + 1), "gaps in {seen:?}");
    assert_eq!(seen.last(), stored.last());
    assert_eq!(stored, (1..=stored.len() as u64).collect::<Vec<_>>());
}
