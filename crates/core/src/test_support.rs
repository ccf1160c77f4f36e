// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event::{sources, EventKind, RunEvent};
use crate::run::RunId;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for schedules and event logs.
pub mod strategies {
    use super::*;
    use crate::run::RunStatus;
    use crate::schedule::{TimeOfDay, Weekday};
    use chrono_tz::Tz;
    use proptest::prelude::*;

    /// Non-empty, sorted, deduplicated weekday set.
    pub fn arb_days() -> impl Strategy<Value = Vec<Weekday>> {
        proptest::sample::subsequence(Weekday::ALL.to_vec(), 1..=7)
    }

    pub fn arb_time_of_day() -> impl Strategy<Value = TimeOfDay> {
        (0u8..24, 0u8..60).prop_map(|(hour, minute)| TimeOfDay { hour, minute })
    }

    /// A mix of zones with and without DST, including a half-hour shift.
    pub fn arb_timezone() -> impl Strategy<Value = Tz> {
        prop::sample::select(vec![
            Tz::UTC,
            chrono_tz::America::New_York,
            chrono_tz::Europe::London,
            chrono_tz::Asia::Tokyo,
            chrono_tz::Asia::Kolkata,
            chrono_tz::Australia::Lord_Howe,
        ])
    }

    /// Instants between 2024 and 2030, second precision.
    pub fn arb_reference() -> impl Strategy<Value = DateTime<Utc>> {
        (1_704_067_200i64..1_893_456_000i64)
            .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    pub fn arb_terminal_status() -> impl Strategy<Value = RunStatus> {
        prop_oneof![
            Just(RunStatus::Completed),
            Just(RunStatus::Partial),
            Just(RunStatus::Failed),
            Just(RunStatus::Cancelled),
        ]
    }

    /// A well-formed event log for one run: `run.started` followed by a mix of
    /// step, phase, process, unknown and terminal events, seq 1..=n.
    pub fn arb_event_log(run_id: RunId) -> impl Strategy<Value = Vec<RunEvent>> {
        let body = prop::collection::vec(arb_body_event(), 0..24);
        (body, proptest::option::of(arb_terminal_status())).prop_map(move |(body, terminal)| {
            let mut events = vec![run_started(&run_id, 0)];
            events.extend(body.into_iter().map(|(kind, payload)| {
                RunEvent::raw(run_id.clone(), kind, sources::ORCHESTRATOR).with_payload(payload)
            }));
            if let Some(status) = terminal {
                events.push(terminal_event(&run_id, 0, status, None));
            }
            for (i, event) in events.iter_mut().enumerate() {
                event.seq = i as u64 + 1;
                event.timestamp = Some(ts(i as i64));
            }
            events
        })
    }

    fn arb_body_event() -> impl Strategy<Value = (String, Value)> {
        let step_ids = prop::sample::select(vec!["plan", "execute", "verify"]);
        prop_oneof![
            (
                prop::sample::select(vec!["step.started", "step_completed", "step.failed", "step.retrying", "step.log"]),
                step_ids,
                proptest::option::of(0u32..4),
                proptest::option::of(prop::sample::select(vec!["", "boom"])),
            )
                .prop_map(|(kind, step, attempt, error)| {
                    let mut payload = json!({"step_id": step});
                    if let Some(attempt) = attempt {
                        payload["attempt"] = json!(attempt);
                    }
                    if let Some(error) = error {
                        payload["error"] = json!(error);
                    }
                    (kind.to_string(), payload)
                }),
            prop::sample::select(vec!["planning", "executing", "verifying"])
                .prop_map(|phase| ("run.phase.changed".to_string(), json!({"phase": phase}))),
            (0u32..5000).prop_map(|pid| ("process.started".to_string(), json!({"process_id": "dev", "pid": pid}))),
            Just(("tool.invoked".to_string(), json!({"name": "grep"}))),
        ]
    }
}

// ── Event factory functions ─────────────────────────────────────────────

/// Deterministic timestamp: 2026-01-01T00:00:00Z plus `secs`.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + secs, 0).single().unwrap_or_default()
}

pub fn run_started(run_id: &RunId, seq: u64) -> RunEvent {
    RunEvent::new(run_id.clone(), EventKind::RunStarted, sources::ORCHESTRATOR)
        .with_seq(seq)
        .with_payload(json!({"prompt": "test prompt"}))
}

pub fn phase_changed(run_id: &RunId, seq: u64, phase: &str) -> RunEvent {
    RunEvent::new(run_id.clone(), EventKind::RunPhaseChanged, sources::ORCHESTRATOR)
        .with_seq(seq)
        .with_payload(json!({"phase": phase}))
}

pub fn step_event(run_id: &RunId, seq: u64, event_type: &str, payload: Value) -> RunEvent {
    RunEvent::raw(run_id.clone(), event_type, sources::ORCHESTRATOR).with_seq(seq).with_payload(payload)
}

pub fn process_event(run_id: &RunId, seq: u64, event_type: &str, payload: Value) -> RunEvent {
    RunEvent::raw(run_id.clone(), event_type, sources::SUBSTRATE).with_seq(seq).with_payload(payload)
}

/// Terminal run event for `status`, with an optional explicit reason.
pub fn terminal_event(
    run_id: &RunId,
    seq: u64,
    status: crate::run::RunStatus,
    reason: Option<&str>,
) -> RunEvent {
    use crate::run::RunStatus;
    let kind = match status {
        RunStatus::Completed => EventKind::RunCompleted,
        RunStatus::Partial => EventKind::RunPartial,
        RunStatus::Failed => EventKind::RunFailed,
        RunStatus::Cancelled => EventKind::RunCancelled,
        RunStatus::Running => EventKind::RunResumed,
    };
    let payload = match reason {
        Some(reason) => json!({"completion_reason": reason}),
        None => json!({}),
    };
    RunEvent::new(run_id.clone(), kind, sources::ORCHESTRATOR).with_seq(seq).with_payload(payload)
}
