// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod processes;
mod steps;

use super::*;
use proptest::prelude::*;
use serde_json::json;
use tl_core::test_support::strategies::arb_event_log;
use tl_core::test_support::{phase_changed, run_started, terminal_event, ts};
use tl_core::{sources, CompletionReason, RunPhase, RunStatus};
use yare::parameterized;

pub(super) fn run_id() -> RunId {
    RunId::from_string("run-test")
}

pub(super) fn projection() -> RunProjection {
    RunProjection::new(Run::new(run_id(), "", ts(0)))
}

// ── Run derivation ───────────────────────────────────────────────────────────

#[test]
fn run_started_sets_running_planning() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1).at(ts(5))).unwrap();

    assert_eq!(p.run.status, RunStatus::Running);
    assert_eq!(p.run.phase, RunPhase::Planning);
    assert_eq!(p.run.prompt, "test prompt");
    assert_eq!(p.run.checkpoint_seq, 1);
    assert_eq!(p.run.updated_at, ts(5));
}

#[test]
fn phase_changed_sets_phase() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    p.apply_event(&phase_changed(&run_id(), 2, "verifying")).unwrap();
    assert_eq!(p.run.phase, RunPhase::Verifying);
}

#[test]
fn unknown_phase_is_ignored() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    p.apply_event(&phase_changed(&run_id(), 2, "daydreaming")).unwrap();
    assert_eq!(p.run.phase, RunPhase::Planning);
    assert_eq!(p.run.checkpoint_seq, 2);
}

#[parameterized(
    completed = { RunStatus::Completed, Some("verified"), RunPhase::Completed, Some(CompletionReason::Verified) },
    completed_no_reason = { RunStatus::Completed, None, RunPhase::Completed, None },
    partial = { RunStatus::Partial, Some("partially_verified"), RunPhase::Completed, Some(CompletionReason::PartiallyVerified) },
    failed_fallback = { RunStatus::Failed, None, RunPhase::Failed, Some(CompletionReason::ActivityError) },
    failed_timeout = { RunStatus::Failed, Some("timeout"), RunPhase::Failed, Some(CompletionReason::Timeout) },
    cancelled_fallback = { RunStatus::Cancelled, None, RunPhase::Cancelled, Some(CompletionReason::UserCancelled) },
    blank_reason_falls_back = { RunStatus::Failed, Some("  "), RunPhase::Failed, Some(CompletionReason::ActivityError) },
)]
fn terminal_events(
    status: RunStatus,
    reason: Option<&str>,
    phase: RunPhase,
    expected_reason: Option<CompletionReason>,
) {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    p.apply_event(&terminal_event(&run_id(), 2, status, reason)).unwrap();

    assert_eq!(p.run.status, status);
    assert_eq!(p.run.phase, phase);
    assert_eq!(p.run.completion_reason, expected_reason);
}

#[test]
fn resumed_reenters_planning_and_records_origin() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    p.apply_event(&terminal_event(&run_id(), 2, RunStatus::Failed, None)).unwrap();
    p.apply_event(
        &RunEvent::new(run_id(), EventKind::RunResumed, sources::ORCHESTRATOR)
            .with_seq(3)
            .with_payload(json!({"resumed_from": 2, "previous_status": "failed"})),
    )
    .unwrap();

    assert_eq!(p.run.status, RunStatus::Running);
    assert_eq!(p.run.phase, RunPhase::Planning);
    assert_eq!(p.run.completion_reason, None);
    assert_eq!(p.run.resumed_from, Some(2));
}

#[test]
fn run_started_carries_automation_id() {
    let mut p = projection();
    p.apply_event(
        &run_started(&run_id(), 1).with_payload(json!({"prompt": "x", "automation_id": "aut-1"})),
    )
    .unwrap();
    assert_eq!(p.run.automation_id.as_ref().map(|a| a.as_str()), Some("aut-1"));
}

#[test]
fn unknown_event_only_advances_checkpoint() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    let before = p.clone();

    p.apply_event(
        &RunEvent::raw(run_id(), "tool.invoked", sources::ORCHESTRATOR).with_seq(2).at(ts(9)),
    )
    .unwrap();

    assert_eq!(p.run.checkpoint_seq, 2);
    assert_eq!(p.run.updated_at, ts(9));
    assert_eq!(p.run.status, before.run.status);
    assert_eq!(p.steps, before.steps);
}

#[test]
fn missing_timestamp_keeps_updated_at() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1).at(ts(3))).unwrap();
    p.apply_event(&phase_changed(&run_id(), 2, "executing")).unwrap();
    assert_eq!(p.run.updated_at, ts(3));
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[test]
fn out_of_order_event_is_rejected() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 2)).unwrap();
    let err = p.apply_event(&phase_changed(&run_id(), 2, "executing")).unwrap_err();
    assert_eq!(err, DeriveError::OutOfOrder { run_id: run_id(), seq: 2, last: 2 });
    assert_eq!(p.run.phase, RunPhase::Planning);
}

#[test]
fn unassigned_seq_is_rejected() {
    let mut p = projection();
    assert!(matches!(
        p.apply_event(&run_started(&run_id(), 0)),
        Err(DeriveError::OutOfOrder { seq: 0, .. })
    ));
}

#[test]
fn event_for_other_run_is_rejected() {
    let mut p = projection();
    let err = p.apply_event(&run_started(&RunId::from_string("run-other"), 1)).unwrap_err();
    assert!(matches!(err, DeriveError::WrongRun { .. }));
}

// ── Replay properties ────────────────────────────────────────────────────────

fn base_run() -> Run {
    Run::new(run_id(), "", ts(0))
}

proptest! {
    #[test]
    fn checkpoint_is_max_seq(events in arb_event_log(run_id())) {
        let p = RunProjection::replay(base_run(), &events).unwrap();
        let max = events.iter().map(|e| e.seq).max().unwrap_or(0);
        prop_assert_eq!(p.run.checkpoint_seq, max);
    }

    #[test]
    fn status_follows_last_status_event(events in arb_event_log(run_id())) {
        let p = RunProjection::replay(base_run(), &events).unwrap();
        let last = events
            .iter()
            .rev()
            .find_map(|e| match e.kind() {
                EventKind::RunStarted | EventKind::RunResumed => Some(RunStatus::Running),
                EventKind::RunCompleted => Some(RunStatus::Completed),
                EventKind::RunPartial => Some(RunStatus::Partial),
                EventKind::RunFailed => Some(RunStatus::Failed),
                EventKind::RunCancelled => Some(RunStatus::Cancelled),
                _ => None,
            });
        prop_assert_eq!(Some(p.run.status), last);
    }

    #[test]
    fn replay_is_idempotent(events in arb_event_log(run_id())) {
        let first = RunProjection::replay(base_run(), &events).unwrap();
        let second = RunProjection::replay(first.run.clone(), &events).unwrap();
        prop_assert_eq!(first, second);
    }
}
