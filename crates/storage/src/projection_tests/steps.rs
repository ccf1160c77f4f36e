// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tl_core::test_support::step_event;
use tl_core::StepStatus;

fn started(p: &mut RunProjection) {
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
}

#[test]
fn step_created_on_first_sight_with_default_kind() {
    let mut p = projection();
    started(&mut p);
    p.apply_event(&step_event(&run_id(), 2, "step.started", json!({"step_id": "plan"})).at(ts(2)))
        .unwrap();

    let step = p.step("plan").unwrap();
    assert_eq!(step.kind, "step");
    assert_eq!(step.status, StepStatus::Running);
    assert_eq!(step.started_at, Some(ts(2)));
    assert_eq!(step.last_seq, 2);
}

#[test]
fn event_without_step_id_is_ignored() {
    let mut p = projection();
    started(&mut p);
    p.apply_event(&step_event(&run_id(), 2, "step.started", json!({"name": "orphan"}))).unwrap();
    assert!(p.steps.is_empty());
    assert_eq!(p.run.checkpoint_seq, 2);
}

#[test]
fn underscored_type_is_normalized() {
    let mut p = projection();
    started(&mut p);
    p.apply_event(&step_event(&run_id(), 2, "STEP_COMPLETED", json!({"step_id": "s"}))).unwrap();
    assert_eq!(p.step("s").unwrap().status, StepStatus::Completed);
}

#[test]
fn last_non_empty_wins_for_descriptive_fields() {
    let mut p = projection();
    started(&mut p);
    p.apply_event(&step_event(
        &run_id(),
        2,
        "step.started",
        json!({
            "step_id": "exec",
            "kind": "execute",
            "name": "Execute plan",
            "parent_step_id": "cycle-1",
            "dependencies": ["plan"],
            "diagnostics": {"tokens": 10},
        }),
    ))
    .unwrap();
    p.apply_event(&step_event(
        &run_id(),
        3,
        "step.completed",
        json!({"step_id": "exec", "kind": "", "name": "  ", "dependencies": [], "diagnostics": null}),
    ))
    .unwrap();

    let step = p.step("exec").unwrap();
    assert_eq!(step.kind, "execute");
    assert_eq!(step.name.as_deref(), Some("Execute plan"));
    assert_eq!(step.parent_step_id.as_deref(), Some("cycle-1"));
    assert_eq!(step.dependencies, vec!["plan"]);
    assert_eq!(step.diagnostics, Some(json!({"tokens": 10})));
    assert_eq!(step.status, StepStatus::Completed);
}

#[test]
fn error_and_policy_decision_take_latest_value() {
    let mut p = projection();
    started(&mut p);
    p.apply_event(&step_event(
        &run_id(),
        2,
        "step.retrying",
        json!({"step_id": "exec", "attempt": 1, "error": "timeout", "policy_decision": "retry"}),
    ))
    .unwrap();
    {
        let step = p.step("exec").unwrap();
        assert_eq!(step.status, StepStatus::Retrying);
        assert_eq!(step.error.as_deref(), Some("timeout"));
        assert_eq!(step.policy_decision.as_deref(), Some("retry"));
    }

    p.apply_event(&step_event(
        &run_id(),
        3,
        "step.completed",
        json!({"step_id": "exec", "attempt": 2, "error": "", "policy_decision": ""}),
    ))
    .unwrap();
    let step = p.step("exec").unwrap();
    assert_eq!(step.attempt, 2);
    assert_eq!(step.error, None);
    assert_eq!(step.policy_decision, None);
}

#[test]
fn absent_error_keeps_previous_value() {
    let mut p = projection();
    started(&mut p);
    p.apply_event(&step_event(&run_id(), 2, "step.failed", json!({"step_id": "v", "error": "bad"})))
        .unwrap();
    p.apply_event(&step_event(&run_id(), 3, "step.annotated", json!({"step_id": "v", "name": "verify"})))
        .unwrap();

    let step = p.step("v").unwrap();
    assert_eq!(step.error.as_deref(), Some("bad"));
    assert_eq!(step.status, StepStatus::Failed);
    assert_eq!(step.name.as_deref(), Some("verify"));
}

#[test]
fn explicit_status_overrides_event_type() {
    let mut p = projection();
    started(&mut p);
    p.apply_event(&step_event(
        &run_id(),
        2,
        "step.failed",
        json!({"step_id": "s", "status": "cancelled"}),
    ))
    .unwrap();
    assert_eq!(p.step("s").unwrap().status, StepStatus::Cancelled);
}

#[test]
fn steps_keep_first_seen_order() {
    let mut p = projection();
    started(&mut p);
    for (seq, id) in [(2, "plan"), (3, "execute"), (4, "plan"), (5, "verify")] {
        p.apply_event(&step_event(&run_id(), seq, "step.started", json!({"step_id": id}))).unwrap();
    }
    let ids: Vec<&str> = p.steps.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["plan", "execute", "verify"]);
}
