// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control loop tests driven directly against an in-memory store.

use super::*;
use crate::broker::EventBroker;
use std::sync::Arc;
use tl_adapters::{ActivityCall, ActivityError, ActivityKind, ExecutionOutput, FakeActivityAdapter};
use tl_core::test_support::ts;
use tl_core::{FakeClock, Run, StepStatus};
use tl_storage::MemoryStore;
use tokio::sync::mpsc;

struct Harness {
    store: Arc<MemoryStore>,
    journal: RunJournal<MemoryStore, FakeClock>,
    adapter: FakeActivityAdapter,
    run_id: RunId,
    tx: mpsc::UnboundedSender<Signal>,
}

impl Harness {
    async fn new() -> (Self, SignalInbox) {
        let store = Arc::new(MemoryStore::new());
        let clock = FakeClock::at(ts(0));
        let journal = RunJournal::new(Arc::clone(&store), EventBroker::default(), clock);
        let run_id = RunId::new();
        store.upsert_run(Run::new(run_id.clone(), "prompt", ts(0))).await.unwrap();
        journal
            .append(RunEvent::new(run_id.clone(), EventKind::RunStarted, sources::ORCHESTRATOR))
            .await
            .unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let harness = Self { store, journal, adapter: FakeActivityAdapter::new(), run_id, tx };
        (harness, SignalInbox::new(rx))
    }

    fn orchestrator(&self, retry: RetryPolicy) -> RunOrchestrator<MemoryStore, FakeActivityAdapter, FakeClock> {
        RunOrchestrator::new(self.run_id.clone(), self.journal.clone(), self.adapter.clone(), retry)
    }

    async fn run_with(&self, mut inbox: SignalInbox, message: &str) -> RunResult {
        inbox.push_message(message);
        self.orchestrator(RetryPolicy::immediate(3)).run(inbox).await.unwrap()
    }

    async fn event_types(&self) -> Vec<String> {
        self.store.list_events(&self.run_id, 0).await.unwrap().into_iter().map(|e| e.event_type).collect()
    }

    async fn events_of(&self, kind: EventKind) -> Vec<RunEvent> {
        let events = self.store.list_events(&self.run_id, 0).await.unwrap();
        events.into_iter().filter(|e| e.kind() == kind).collect()
    }

    async fn run(&self) -> Run {
        self.store.get_run(&self.run_id).await.unwrap().unwrap()
    }

    async fn step(&self, id: &str) -> tl_core::RunStep {
        self.store.get_step(&self.run_id, id).await.unwrap().unwrap()
    }
}

fn texts(calls: Vec<ActivityCall>) -> Vec<String> {
    calls.iter().map(|c| c.text().to_string()).collect()
}

#[tokio::test]
async fn single_message_runs_full_cycle_to_completion() {
    let (h, inbox) = Harness::new().await;

    let result = h.run_with(inbox, "build it").await;

    assert_eq!(result, RunResult::new(RunStatus::Completed, CompletionReason::Verified));
    let run = h.run().await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.phase, RunPhase::Completed);
    assert_eq!(run.completion_reason, Some(CompletionReason::Verified));

    let kinds: Vec<ActivityKind> = h.adapter.calls().iter().map(|c| c.kind()).collect();
    assert_eq!(kinds, vec![ActivityKind::Plan, ActivityKind::Execute, ActivityKind::Verify]);

    let phases: Vec<String> = h
        .events_of(EventKind::RunPhaseChanged)
        .await
        .iter()
        .filter_map(|e| e.payload_str("phase").map(String::from))
        .collect();
    assert_eq!(phases, vec!["executing", "verifying"]);
    assert_eq!(h.event_types().await.last().map(String::as_str), Some("run.completed"));
}

#[tokio::test]
async fn cycle_steps_record_parent_and_dependencies() {
    let (h, inbox) = Harness::new().await;
    h.run_with(inbox, "build it").await;

    let cycle = h.step("c1").await;
    assert_eq!(cycle.kind, CYCLE_STEP_KIND);
    assert_eq!(cycle.status, StepStatus::Completed);

    let plan = h.step("c1/plan").await;
    assert_eq!(plan.parent_step_id.as_deref(), Some("c1"));
    assert!(plan.dependencies.is_empty());

    let execute = h.step("c1/execute").await;
    assert_eq!(execute.dependencies, vec!["c1/plan".to_string()]);
    assert_eq!(execute.status, StepStatus::Completed);
    assert_eq!(execute.attempt, 1);

    let verify = h.step("c1/verify").await;
    assert_eq!(verify.dependencies, vec!["c1/execute".to_string()]);
}

#[tokio::test]
async fn plan_id_flows_into_execute_and_verify() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_plan_result(Ok(tl_adapters::PlanOutput { plan_id: "plan-xyz".into() }));

    h.run_with(inbox, "go").await;

    for call in h.adapter.calls() {
        match call {
            ActivityCall::Execute { plan_id, .. } | ActivityCall::Verify { plan_id, .. } => {
                assert_eq!(plan_id, "plan-xyz")
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn execute_failure_skips_verify_and_reports_to_failure_hook() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_execute_result(Err(ActivityError::Terminal("disk full".into())));

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result, RunResult::failed(CompletionReason::ActivityError));
    assert!(h.adapter.calls_of(ActivityKind::Verify).is_empty());
    assert_eq!(texts(h.adapter.calls_of(ActivityKind::HandleFailure)), vec!["execution: disk full".to_string()]);

    let failed = h.events_of(EventKind::RunFailed).await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].payload_str("completion_reason"), Some("activity_error"));
    assert_eq!(failed[0].payload_str("error"), Some("execution: disk full"));
    assert_eq!(h.step("c1").await.status, StepStatus::Failed);
}

#[tokio::test]
async fn failing_failure_hook_still_fails_run() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_plan_result(Err(ActivityError::Terminal("bad input".into())));
    h.adapter.push_failure_result(Err(ActivityError::Terminal("hook broke".into())));

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(texts(h.adapter.calls_of(ActivityKind::HandleFailure)), vec!["planning: bad input".to_string()]);
    assert_eq!(h.step("c1/handle_failure").await.status, StepStatus::Failed);
}

#[tokio::test]
async fn transient_failure_is_retried_then_succeeds() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_plan_result(Err(ActivityError::Transient("busy".into())));

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(h.adapter.calls_of(ActivityKind::Plan).len(), 2);

    let retrying = h.events_of(EventKind::StepRetrying).await;
    assert_eq!(retrying.len(), 1);
    assert_eq!(retrying[0].payload_str("policy_decision"), Some("retry"));

    let plan = h.step("c1/plan").await;
    assert_eq!(plan.attempt, 2);
    assert_eq!(plan.status, StepStatus::Completed);
    assert_eq!(plan.error, None);
}

#[tokio::test]
async fn exhausted_retries_fail_with_fail_decision() {
    let (h, inbox) = Harness::new().await;
    for _ in 0..3 {
        h.adapter.push_execute_result(Err(ActivityError::Transient("timeout".into())));
    }

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(h.adapter.calls_of(ActivityKind::Execute).len(), 3);
    let execute = h.step("c1/execute").await;
    assert_eq!(execute.attempt, 3);
    assert_eq!(execute.policy_decision.as_deref(), Some("fail"));
    assert_eq!(execute.error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn terminal_error_is_not_retried() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_plan_result(Err(ActivityError::Terminal("invalid".into())));

    h.run_with(inbox, "go").await;

    assert_eq!(h.adapter.calls_of(ActivityKind::Plan).len(), 1);
    assert!(h.events_of(EventKind::StepRetrying).await.is_empty());
}

#[tokio::test]
async fn partial_verdict_finishes_partial() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_verify_result(Ok(VerifyOutput::new("partial", "")));

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result, RunResult::new(RunStatus::Partial, CompletionReason::PartiallyVerified));
    assert_eq!(h.run().await.phase, RunPhase::Completed);
}

#[tokio::test]
async fn unknown_verdict_status_is_coerced_to_failed() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_verify_result(Ok(VerifyOutput::new("mostly-ok", "")));

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result, RunResult::new(RunStatus::Failed, CompletionReason::VerificationFailed));
    assert!(h.adapter.calls_of(ActivityKind::HandleFailure).is_empty());
}

#[tokio::test]
async fn verifier_reason_and_diagnostics_are_kept() {
    let (h, inbox) = Harness::new().await;
    let mut verdict = VerifyOutput::new("failed", "tests_red");
    verdict.diagnostics = vec!["3 tests failed".into()];
    h.adapter.push_verify_result(Ok(verdict));

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result.completion_reason, CompletionReason::Other("tests_red".into()));
    let failed = h.events_of(EventKind::RunFailed).await;
    assert_eq!(failed[0].payload_str_list("diagnostics"), vec!["3 tests failed".to_string()]);
    assert!(h.step("c1/verify").await.diagnostics.is_some());
}

#[tokio::test]
async fn cancel_before_first_activity_calls_nothing() {
    let (h, inbox) = Harness::new().await;
    h.tx.send(Signal::Cancel).unwrap();

    let result = h.run_with(inbox, "go").await;

    assert_eq!(result, RunResult::cancelled());
    assert!(h.adapter.calls().is_empty());
    assert!(h.events_of(EventKind::RunCompleted).await.is_empty());
    assert!(h.events_of(EventKind::RunFailed).await.is_empty());
    assert_eq!(h.run().await.completion_reason, Some(CompletionReason::UserCancelled));
}

#[tokio::test]
async fn cancel_during_activity_stops_at_next_boundary() {
    let (h, inbox) = Harness::new().await;
    let gate = h.adapter.gate(ActivityKind::Execute);
    let mut inbox = inbox;
    inbox.push_message("go");
    let task = tokio::spawn(h.orchestrator(RetryPolicy::immediate(3)).run(inbox));

    gate.entered().await;
    h.tx.send(Signal::Cancel).unwrap();
    gate.release(1);

    let result = task.await.unwrap().unwrap();
    assert_eq!(result, RunResult::cancelled());
    assert!(h.adapter.calls_of(ActivityKind::Verify).is_empty());
    assert_eq!(h.step("c1/execute").await.status, StepStatus::Completed);
    assert_eq!(h.step("c1").await.status, StepStatus::Cancelled);
}

#[tokio::test]
async fn cancel_wins_over_failure_hook() {
    let (h, inbox) = Harness::new().await;
    let gate = h.adapter.gate(ActivityKind::Execute);
    h.adapter.push_execute_result(Err(ActivityError::Terminal("boom".into())));
    let mut inbox = inbox;
    inbox.push_message("go");
    let task = tokio::spawn(h.orchestrator(RetryPolicy::immediate(3)).run(inbox));

    gate.entered().await;
    h.tx.send(Signal::Cancel).unwrap();
    gate.release(1);

    assert_eq!(task.await.unwrap().unwrap(), RunResult::cancelled());
    assert!(h.adapter.calls_of(ActivityKind::HandleFailure).is_empty());
    assert!(h.events_of(EventKind::RunFailed).await.is_empty());
}

#[tokio::test]
async fn new_message_supersedes_rest_of_cycle() {
    let (h, inbox) = Harness::new().await;
    let gate = h.adapter.gate(ActivityKind::Plan);
    let mut inbox = inbox;
    inbox.push_message("first");
    let task = tokio::spawn(h.orchestrator(RetryPolicy::immediate(3)).run(inbox));

    gate.entered().await;
    h.tx.send(Signal::Message("second".into())).unwrap();
    gate.release(2);

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(texts(h.adapter.calls_of(ActivityKind::Plan)), vec!["first".to_string(), "second".to_string()]);
    assert_eq!(texts(h.adapter.calls_of(ActivityKind::Execute)), vec!["second".to_string()]);

    let first = h.step("c1").await;
    assert_eq!(first.status, StepStatus::Cancelled);
    assert_eq!(first.policy_decision.as_deref(), Some("superseded"));
    assert_eq!(h.step("c2").await.status, StepStatus::Completed);
}

#[tokio::test]
async fn message_during_verify_starts_another_cycle() {
    let (h, inbox) = Harness::new().await;
    let gate = h.adapter.gate(ActivityKind::Verify);
    h.adapter.push_verify_result(Ok(VerifyOutput::new("failed", "")));
    let mut inbox = inbox;
    inbox.push_message("try");
    let task = tokio::spawn(h.orchestrator(RetryPolicy::immediate(3)).run(inbox));

    gate.entered().await;
    h.tx.send(Signal::Message("try harder".into())).unwrap();
    gate.release(2);

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(h.adapter.calls_of(ActivityKind::Verify).len(), 2);
    assert_eq!(h.events_of(EventKind::RunFailed).await.len(), 0);
}

#[tokio::test]
async fn idle_loop_waits_for_first_message() {
    let (h, inbox) = Harness::new().await;
    let task = tokio::spawn(h.orchestrator(RetryPolicy::immediate(3)).run(inbox));

    tokio::task::yield_now().await;
    assert!(h.adapter.calls().is_empty());
    h.tx.send(Signal::Message("late start".into())).unwrap();

    let result = task.await.unwrap().unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(texts(h.adapter.calls_of(ActivityKind::Plan)), vec!["late start".to_string()]);
}

#[tokio::test]
async fn closed_signal_channel_while_idle_cancels() {
    let (h, inbox) = Harness::new().await;
    let orchestrator = h.orchestrator(RetryPolicy::immediate(3));
    drop(h.tx);

    let result = orchestrator.run(inbox).await.unwrap();
    assert_eq!(result, RunResult::cancelled());
}

#[tokio::test]
async fn resumed_loop_continues_cycle_numbering() {
    let (h, inbox) = Harness::new().await;
    h.run_with(inbox, "first run").await;
    h.journal
        .append(RunEvent::new(h.run_id.clone(), EventKind::RunResumed, sources::SUBSTRATE))
        .await
        .unwrap();

    let (_tx, rx) = mpsc::unbounded_channel();
    let mut inbox = SignalInbox::new(rx);
    inbox.push_message("again");
    let result = h.orchestrator(RetryPolicy::immediate(3)).run(inbox).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(h.step("c2").await.status, StepStatus::Completed);
}

#[tokio::test]
async fn execution_output_is_not_required_to_match_plan() {
    let (h, inbox) = Harness::new().await;
    h.adapter.push_execute_result(Ok(ExecutionOutput { plan_id: "other".into(), result: "done".into() }));

    assert_eq!(h.run_with(inbox, "go").await.status, RunStatus::Completed);
}
