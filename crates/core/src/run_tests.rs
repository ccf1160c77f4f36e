// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

#[parameterized(
    running = { RunStatus::Running, false, RunPhase::Running },
    completed = { RunStatus::Completed, true, RunPhase::Completed },
    partial = { RunStatus::Partial, true, RunPhase::Completed },
    failed = { RunStatus::Failed, true, RunPhase::Failed },
    cancelled = { RunStatus::Cancelled, true, RunPhase::Cancelled },
)]
fn status_terminality(status: RunStatus, terminal: bool, phase: RunPhase) {
    assert_eq!(status.is_terminal(), terminal);
    assert_eq!(status.terminal_phase(), phase);
}

#[test]
fn status_parse_is_case_insensitive() {
    assert_eq!(RunStatus::parse("Completed"), Some(RunStatus::Completed));
    assert_eq!(RunStatus::parse(" PARTIAL "), Some(RunStatus::Partial));
    assert_eq!(RunStatus::parse("bogus"), None);
}

#[test]
fn status_serde_uses_wire_token() {
    let json = serde_json::to_string(&RunStatus::Cancelled).unwrap();
    assert_eq!(json, "\"cancelled\"");
    let parsed: RunStatus = serde_json::from_str("\"failed\"").unwrap();
    assert_eq!(parsed, RunStatus::Failed);
    assert!(serde_json::from_str::<RunStatus>("\"nope\"").is_err());
}

#[parameterized(
    verified = { "verified", CompletionReason::Verified },
    activity_error = { "activity_error", CompletionReason::ActivityError },
    user_cancelled = { "user_cancelled", CompletionReason::UserCancelled },
    timeout = { "timeout", CompletionReason::Timeout },
    custom = { "needs_review", CompletionReason::Other("needs_review".to_string()) },
)]
fn completion_reason_parse(raw: &str, expected: CompletionReason) {
    let parsed = CompletionReason::parse(raw);
    assert_eq!(parsed, expected);
    assert_eq!(parsed.as_str(), raw);
}

#[test]
fn completion_reason_serializes_as_string() {
    let json = serde_json::to_string(&CompletionReason::Other("x".into())).unwrap();
    assert_eq!(json, "\"x\"");
    let parsed: CompletionReason = serde_json::from_str("\"timeout\"").unwrap();
    assert_eq!(parsed, CompletionReason::Timeout);
}

#[test]
fn fallback_reasons() {
    assert_eq!(
        CompletionReason::fallback_for(RunStatus::Failed),
        Some(CompletionReason::ActivityError)
    );
    assert_eq!(
        CompletionReason::fallback_for(RunStatus::Cancelled),
        Some(CompletionReason::UserCancelled)
    );
    assert_eq!(CompletionReason::fallback_for(RunStatus::Completed), None);
}

#[test]
fn reset_derived_restores_creation_state() {
    let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut run = Run::new(RunId::from_string("run-a"), "do it", created);
    run.status = RunStatus::Failed;
    run.phase = RunPhase::Failed;
    run.completion_reason = Some(CompletionReason::Timeout);
    run.checkpoint_seq = 9;
    run.resumed_from = Some(4);
    run.updated_at = created + chrono::Duration::minutes(5);

    run.reset_derived();

    assert_eq!(run, Run::new(RunId::from_string("run-a"), "do it", created));
}

#[test]
fn result_is_none_while_running() {
    let run = Run::new(RunId::new(), "p", Utc::now());
    assert!(run.result().is_none());
}

#[test]
fn result_falls_back_to_default_reason() {
    let mut run = Run::new(RunId::new(), "p", Utc::now());
    run.status = RunStatus::Cancelled;
    let result = run.result().unwrap();
    assert_eq!(result, RunResult::cancelled());
}
