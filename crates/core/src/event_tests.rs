// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    dotted = { "run.started", EventKind::RunStarted },
    underscored = { "run_started", EventKind::RunStarted },
    upper = { "RUN.PHASE_CHANGED", EventKind::RunPhaseChanged },
    step_completed = { "Step_Completed", EventKind::StepCompleted },
    step_custom = { "step.heartbeat", EventKind::StepOther },
    process_exit = { "process_exited", EventKind::ProcessExited },
    unknown = { "tool.invoked", EventKind::Unknown },
    empty = { "", EventKind::Unknown },
)]
fn kind_parse(raw: &str, expected: EventKind) {
    assert_eq!(EventKind::parse(raw), expected);
}

#[test]
fn known_kinds_round_trip_through_wire_name() {
    for kind in [
        EventKind::RunStarted,
        EventKind::RunPhaseChanged,
        EventKind::RunCompleted,
        EventKind::RunPartial,
        EventKind::RunFailed,
        EventKind::RunCancelled,
        EventKind::RunResumed,
        EventKind::StepStarted,
        EventKind::StepCompleted,
        EventKind::StepFailed,
        EventKind::StepRetrying,
        EventKind::ProcessStarted,
        EventKind::ProcessUpdated,
        EventKind::ProcessOutput,
        EventKind::ProcessExited,
    ] {
        assert_eq!(EventKind::parse(kind.as_str()), kind);
    }
}

#[test]
fn kind_classification() {
    assert!(EventKind::StepOther.is_step());
    assert!(!EventKind::RunStarted.is_step());
    assert!(EventKind::ProcessOutput.is_process());
    assert!(EventKind::RunPartial.is_terminal());
    assert!(!EventKind::RunResumed.is_terminal());
}

#[test]
fn event_serializes_type_field() {
    let event = RunEvent::new(RunId::from_string("run-1"), EventKind::RunStarted, sources::ORCHESTRATOR)
        .with_seq(1)
        .with_payload(json!({"prompt": "hi"}));
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "run.started");
    assert_eq!(value["seq"], 1);
    assert_eq!(value["source"], "orchestrator");
    assert!(value.get("timestamp").is_none());

    let parsed: RunEvent = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn event_deserializes_with_missing_optionals() {
    let parsed: RunEvent =
        serde_json::from_value(json!({"run_id": "run-x", "type": "step_started"})).unwrap();
    assert_eq!(parsed.seq, 0);
    assert_eq!(parsed.kind(), EventKind::StepStarted);
    assert!(parsed.payload.is_null());
    assert_eq!(parsed.payload_str("step_id"), None);
}

#[test]
fn payload_accessors() {
    let event = RunEvent::raw(RunId::from_string("run-1"), "step.started", "test").with_payload(json!({
        "step_id": "s1",
        "blank": "  ",
        "attempt": 2,
        "attempt_str": "3",
        "pid": -1,
        "deps": ["a", "", "b", 7],
        "one": "solo",
    }));
    assert_eq!(event.payload_str("step_id"), Some("s1"));
    assert_eq!(event.payload_str("blank"), Some("  "));
    assert_eq!(event.payload_nonempty("blank"), None);
    assert_eq!(event.payload_u64("attempt"), Some(2));
    assert_eq!(event.payload_u64("attempt_str"), Some(3));
    assert_eq!(event.payload_u64("pid"), None);
    assert_eq!(event.payload_i64("pid"), Some(-1));
    assert_eq!(event.payload_str_list("deps"), vec!["a", "b"]);
    assert_eq!(event.payload_str_list("one"), vec!["solo"]);
    assert!(event.payload_str_list("missing").is_empty());
}

#[test]
fn log_summary_includes_type_run_and_seq() {
    let event = RunEvent::new(RunId::from_string("run-z"), EventKind::RunFailed, sources::SUBSTRATE)
        .with_seq(7);
    assert_eq!(event.log_summary(), "run.failed run=run-z seq=7");
}
