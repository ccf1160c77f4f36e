// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use tl_core::test_support::{run_started, step_event, terminal_event, ts};
use tl_core::{
    sources, EventKind, InboxResult, InboxStatus, MessageRole, RunPhase, RunStatus, StepStatus,
    Trigger,
};

async fn store_with_run(id: &str) -> (MemoryStore, RunId) {
    let store = MemoryStore::new();
    let run_id = RunId::from_string(id);
    store.upsert_run(Run::new(run_id.clone(), "prompt", ts(0))).await.unwrap();
    (store, run_id)
}

// ── Events and sequencing ────────────────────────────────────────────────────

#[tokio::test]
async fn append_assigns_gap_free_seq() {
    let (store, run_id) = store_with_run("run-1").await;
    assert_eq!(store.next_seq(&run_id).await.unwrap(), 1);

    let first = store.append_event(run_started(&run_id, 0)).await.unwrap();
    let second = store
        .append_event(RunEvent::raw(run_id.clone(), "note", sources::ORCHESTRATOR))
        .await
        .unwrap();

    assert_eq!((first.seq, second.seq), (1, 2));
    assert_eq!(store.next_seq(&run_id).await.unwrap(), 3);
}

#[tokio::test]
async fn explicit_seq_must_match_next() {
    let (store, run_id) = store_with_run("run-1").await;
    store.append_event(run_started(&run_id, 1)).await.unwrap();

    let err = store.append_event(terminal_event(&run_id, 5, RunStatus::Completed, None)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let err = store.append_event(terminal_event(&run_id, 1, RunStatus::Completed, None)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.list_events(&run_id, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn append_to_unknown_run_is_not_found() {
    let store = MemoryStore::new();
    let err = store.append_event(run_started(&RunId::from_string("run-x"), 0)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_stay_gap_free() {
    let (store, run_id) = store_with_run("run-1").await;
    store.append_event(run_started(&run_id, 0)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..50 {
        let store = store.clone();
        let run_id = run_id.clone();
        handles.push(tokio::spawn(async move {
            store
                .append_event(step_event(&run_id, 0, "step.started", json!({"step_id": format!("s{i}")})))
                .await
                .unwrap()
                .seq
        }));
    }
    let mut seqs = Vec::new();
    for handle in handles {
        seqs.push(handle.await.unwrap());
    }
    seqs.sort_unstable();

    assert_eq!(seqs, (2..=51).collect::<Vec<u64>>());
    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.checkpoint_seq, 51);
}

#[tokio::test]
async fn list_events_after_seq() {
    let (store, run_id) = store_with_run("run-1").await;
    store.append_event(run_started(&run_id, 0)).await.unwrap();
    for _ in 0..3 {
        store.append_event(RunEvent::raw(run_id.clone(), "note", sources::ORCHESTRATOR)).await.unwrap();
    }

    let seqs: Vec<u64> = store.list_events(&run_id, 2).await.unwrap().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![3, 4]);
}

#[tokio::test]
async fn append_folds_projection() {
    let (store, run_id) = store_with_run("run-1").await;
    store.append_event(run_started(&run_id, 0)).await.unwrap();
    store
        .append_event(step_event(&run_id, 0, "step.failed", json!({"step_id": "exec", "error": "boom"})))
        .await
        .unwrap();
    store.append_event(terminal_event(&run_id, 0, RunStatus::Failed, None)).await.unwrap();

    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.phase, RunPhase::Failed);
    assert_eq!(run.checkpoint_seq, 3);

    let step = store.get_step(&run_id, "exec").await.unwrap().unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.error.as_deref(), Some("boom"));
    assert_eq!(store.list_steps(&run_id).await.unwrap().len(), 1);
}

// ── Runs ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_keeps_derived_fields() {
    let (store, run_id) = store_with_run("run-1").await;
    store.append_event(run_started(&run_id, 0)).await.unwrap();
    store.append_event(terminal_event(&run_id, 0, RunStatus::Completed, Some("verified"))).await.unwrap();

    let mut stale = Run::new(run_id.clone(), "new prompt", ts(0));
    stale.status = RunStatus::Running;
    store.upsert_run(stale).await.unwrap();

    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.prompt, "new prompt");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.checkpoint_seq, 2);
}

#[tokio::test]
async fn list_runs_filters_newest_first() {
    let store = MemoryStore::new();
    for (id, secs) in [("run-a", 1), ("run-b", 3), ("run-c", 2)] {
        let run_id = RunId::from_string(id);
        store.upsert_run(Run::new(run_id.clone(), "p", ts(secs))).await.unwrap();
        store.append_event(run_started(&run_id, 0)).await.unwrap();
    }
    store
        .append_event(terminal_event(&RunId::from_string("run-c"), 0, RunStatus::Cancelled, None))
        .await
        .unwrap();

    let all: Vec<String> =
        store.list_runs(&RunFilter::default()).await.unwrap().into_iter().map(|r| r.id.to_string()).collect();
    assert_eq!(all, vec!["run-b", "run-c", "run-a"]);

    let running = store.list_runs(&RunFilter::with_status(RunStatus::Running)).await.unwrap();
    assert_eq!(running.len(), 2);

    let limited = store.list_runs(&RunFilter { limit: Some(1), ..RunFilter::default() }).await.unwrap();
    assert_eq!(limited[0].id, "run-b");
}

// ── Messages and artifacts ───────────────────────────────────────────────────

#[tokio::test]
async fn messages_keep_append_order() {
    let (store, run_id) = store_with_run("run-1").await;
    store.append_message(RunMessage::user(run_id.clone(), "hello", ts(1))).await.unwrap();
    store
        .append_message(RunMessage::new(run_id.clone(), MessageRole::Assistant, "hi", ts(2)))
        .await
        .unwrap();

    let messages = store.list_messages(&run_id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "hi"]);
}

#[tokio::test]
async fn artifacts_require_run() {
    let store = MemoryStore::new();
    let err = store
        .add_artifact(Artifact::new(RunId::from_string("run-x"), "report", "file", "/tmp/r.md", ts(0)))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ── Automations and inbox ────────────────────────────────────────────────────

#[tokio::test]
async fn automations_list_oldest_first_and_delete() {
    let store = MemoryStore::new();
    let late = Automation::builder().id("aut-late").created_at(ts(10)).build();
    let early = Automation::builder().id("aut-early").created_at(ts(1)).build();
    store.upsert_automation(late).await.unwrap();
    store.upsert_automation(early).await.unwrap();

    let ids: Vec<String> =
        store.list_automations().await.unwrap().into_iter().map(|a| a.id.to_string()).collect();
    assert_eq!(ids, vec!["aut-early", "aut-late"]);

    assert!(store.delete_automation(&AutomationId::from_string("aut-late")).await.unwrap());
    assert!(!store.delete_automation(&AutomationId::from_string("aut-late")).await.unwrap());
}

#[tokio::test]
async fn inbox_is_newest_first_and_filterable() {
    let store = MemoryStore::new();
    let a = Automation::builder().id("aut-a").build();
    let b = Automation::builder().id("aut-b").build();
    let mut first = AutomationInboxEntry::running(&a, Trigger::Scheduled, ts(1));
    first.finish_with_error("boom", ts(2));
    let second = AutomationInboxEntry::running(&b, Trigger::Manual, ts(5));
    let third = AutomationInboxEntry::running(&a, Trigger::Manual, ts(9));
    for entry in [&first, &second, &third] {
        store.create_inbox_entry(entry.clone()).await.unwrap();
    }

    let all = store.list_inbox(&InboxFilter::default()).await.unwrap();
    assert_eq!(all.iter().map(|e| e.id.clone()).collect::<Vec<_>>(), vec![
        third.id.clone(),
        second.id.clone(),
        first.id.clone()
    ]);

    let for_a = store.list_inbox(&InboxFilter::for_automation(a.id.clone())).await.unwrap();
    assert_eq!(for_a.len(), 2);

    let unread = store.list_inbox(&InboxFilter { unread_only: true, ..InboxFilter::default() }).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].id, first.id);

    let running = store
        .list_inbox(&InboxFilter { status: Some(InboxStatus::Running), ..InboxFilter::default() })
        .await
        .unwrap();
    assert_eq!(running.len(), 2);
}

#[tokio::test]
async fn mark_read_touches_only_read_state() {
    let store = MemoryStore::new();
    let automation = Automation::builder().build();
    let mut entry = AutomationInboxEntry::running(&automation, Trigger::Manual, ts(1));
    entry.finish_with_result(
        RunStatus::Completed,
        InboxResult {
            run_id: RunId::from_string("run-1"),
            phase: RunPhase::Completed,
            completion_reason: tl_core::CompletionReason::Verified,
            diagnostics: Vec::new(),
        },
        ts(2),
    );
    store.create_inbox_entry(entry.clone()).await.unwrap();

    store.mark_inbox_read(&entry.id, true).await.unwrap();
    let read = store.get_inbox_entry(&entry.id).await.unwrap().unwrap();
    assert!(!read.unread);
    assert_eq!(read.result, entry.result);
    assert_eq!(read.status, entry.status);

    store.mark_inbox_read(&entry.id, false).await.unwrap();
    assert!(store.get_inbox_entry(&entry.id).await.unwrap().unwrap().unread);
}

#[tokio::test]
async fn inbox_create_conflict_and_update_not_found() {
    let store = MemoryStore::new();
    let automation = Automation::builder().build();
    let entry = AutomationInboxEntry::running(&automation, Trigger::Manual, ts(1));

    store.create_inbox_entry(entry.clone()).await.unwrap();
    assert!(matches!(store.create_inbox_entry(entry.clone()).await, Err(StoreError::Conflict(_))));

    let other = AutomationInboxEntry::running(&automation, Trigger::Manual, ts(2));
    assert!(store.update_inbox_entry(other.clone()).await.unwrap_err().is_not_found());
    assert!(store.mark_inbox_read(&other.id, true).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn unknown_event_type_is_stored_but_ignored() {
    let (store, run_id) = store_with_run("run-1").await;
    store.append_event(run_started(&run_id, 0)).await.unwrap();
    store
        .append_event(RunEvent::new(run_id.clone(), EventKind::Unknown, sources::ORCHESTRATOR))
        .await
        .unwrap();
    let run = store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(store.list_events(&run_id, 0).await.unwrap().len(), 2);
}
