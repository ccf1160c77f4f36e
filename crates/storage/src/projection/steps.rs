// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use indexmap::IndexMap;
use serde_json::Value;
use tl_core::{EventKind, RunEvent, RunStep, StepStatus};

/// Merge a `step.*` event into its step.
///
/// Descriptive fields follow last-non-empty-wins. `status`, `attempt`,
/// `policy_decision` and `error` take the event's value whenever the key is
/// present, so an empty string clears them.
pub(super) fn apply(steps: &mut IndexMap<String, RunStep>, kind: EventKind, event: &RunEvent) {
    let Some(step_id) = event.payload_nonempty("step_id") else {
        return;
    };
    let step = steps
        .entry(step_id.to_string())
        .or_insert_with(|| RunStep::new(event.run_id.clone(), step_id));

    if let Some(parent) = event.payload_nonempty("parent_step_id") {
        step.parent_step_id = Some(parent.to_string());
    }
    if let Some(step_kind) = event.payload_nonempty("kind") {
        step.kind = step_kind.to_string();
    }
    if let Some(name) = event.payload_nonempty("name") {
        step.name = Some(name.to_string());
    }
    let dependencies = event.payload_str_list("dependencies");
    if !dependencies.is_empty() {
        step.dependencies = dependencies;
    }
    if let Some(diagnostics) = event.payload.get("diagnostics").filter(|v| !is_blank(v)) {
        step.diagnostics = Some(diagnostics.clone());
    }

    let status = event
        .payload_str("status")
        .and_then(StepStatus::parse)
        .or_else(|| StepStatus::implied_by(kind));
    if let Some(status) = status {
        step.status = status;
    }
    if let Some(attempt) = event.payload_u64("attempt") {
        step.attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
    }
    if let Some(decision) = event.payload_str("policy_decision") {
        step.policy_decision = non_empty(decision);
    }
    if let Some(error) = event.payload_str("error") {
        step.error = non_empty(error);
    }

    if kind == EventKind::StepStarted && step.started_at.is_none() {
        step.started_at = event.timestamp;
    }
    if event.timestamp.is_some() {
        step.updated_at = event.timestamp;
    }
    step.last_seq = event.seq;
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
