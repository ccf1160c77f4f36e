// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run events: the append-only facts a run's state is folded from.
//!
//! Event types travel as strings (`"run.started"`, `"step_completed"`, ...)
//! and are normalized into [`EventKind`] before dispatch. Unknown types map
//! to [`EventKind::Unknown`] and are ignored by the deriver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::run::RunId;

/// Well-known event sources.
pub mod sources {
    /// The per-run control loop.
    pub const ORCHESTRATOR: &str = "orchestrator";
    /// The execution substrate (deadlines, restarts).
    pub const SUBSTRATE: &str = "substrate";
    /// The automation scheduler.
    pub const SCHEDULER: &str = "scheduler";
}

/// Closed set of event types understood by the deriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStarted,
    RunPhaseChanged,
    RunCompleted,
    RunPartial,
    RunFailed,
    RunCancelled,
    RunResumed,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepRetrying,
    /// Any other `step.*` type; still folded into the step projection.
    StepOther,
    ProcessStarted,
    ProcessUpdated,
    ProcessOutput,
    ProcessExited,
    Unknown,
}

impl EventKind {
    /// Normalize a raw type string (`_` becomes `.`, lower-cased) and classify it.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', ".");
        match normalized.as_str() {
            "run.started" => EventKind::RunStarted,
            "run.phase.changed" => EventKind::RunPhaseChanged,
            "run.completed" => EventKind::RunCompleted,
            "run.partial" => EventKind::RunPartial,
            "run.failed" => EventKind::RunFailed,
            "run.cancelled" => EventKind::RunCancelled,
            "run.resumed" => EventKind::RunResumed,
            "step.started" => EventKind::StepStarted,
            "step.completed" => EventKind::StepCompleted,
            "step.failed" => EventKind::StepFailed,
            "step.retrying" => EventKind::StepRetrying,
            "process.started" => EventKind::ProcessStarted,
            "process.updated" => EventKind::ProcessUpdated,
            "process.output" => EventKind::ProcessOutput,
            "process.exited" => EventKind::ProcessExited,
            s if s.starts_with("step.") => EventKind::StepOther,
            _ => EventKind::Unknown,
        }
    }

    /// Canonical wire name. `StepOther` and `Unknown` have none of their own.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run.started",
            EventKind::RunPhaseChanged => "run.phase.changed",
            EventKind::RunCompleted => "run.completed",
            EventKind::RunPartial => "run.partial",
            EventKind::RunFailed => "run.failed",
            EventKind::RunCancelled => "run.cancelled",
            EventKind::RunResumed => "run.resumed",
            EventKind::StepStarted => "step.started",
            EventKind::StepCompleted => "step.completed",
            EventKind::StepFailed => "step.failed",
            EventKind::StepRetrying => "step.retrying",
            EventKind::StepOther => "step",
            EventKind::ProcessStarted => "process.started",
            EventKind::ProcessUpdated => "process.updated",
            EventKind::ProcessOutput => "process.output",
            EventKind::ProcessExited => "process.exited",
            EventKind::Unknown => "unknown",
        }
    }

    pub fn is_step(&self) -> bool {
        matches!(
            self,
            EventKind::StepStarted
                | EventKind::StepCompleted
                | EventKind::StepFailed
                | EventKind::StepRetrying
                | EventKind::StepOther
        )
    }

    pub fn is_process(&self) -> bool {
        matches!(
            self,
            EventKind::ProcessStarted
                | EventKind::ProcessUpdated
                | EventKind::ProcessOutput
                | EventKind::ProcessExited
        )
    }

    /// Events that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::RunCompleted
                | EventKind::RunPartial
                | EventKind::RunFailed
                | EventKind::RunCancelled
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable fact about a run.
///
/// `seq` is zero until the store assigns it on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    #[serde(default)]
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub payload: Value,
}

impl RunEvent {
    pub fn new(run_id: RunId, kind: EventKind, source: &str) -> Self {
        Self::raw(run_id, kind.as_str(), source)
    }

    /// Event with an arbitrary type string (may be unknown to the deriver).
    pub fn raw(run_id: RunId, event_type: impl Into<String>, source: &str) -> Self {
        Self {
            run_id,
            seq: 0,
            event_type: event_type.into(),
            timestamp: None,
            source: source.to_string(),
            payload: Value::Object(Default::default()),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event_type)
    }

    /// Payload string field. `None` when absent or not a string.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Payload string field, treating blank strings as absent.
    pub fn payload_nonempty(&self, key: &str) -> Option<&str> {
        self.payload_str(key).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Payload integer field. Accepts numbers and numeric strings.
    pub fn payload_u64(&self, key: &str) -> Option<u64> {
        match self.payload.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn payload_i64(&self, key: &str) -> Option<i64> {
        match self.payload.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Payload list of non-empty strings. A single string is a one-element list.
    pub fn payload_str_list(&self, key: &str) -> Vec<String> {
        match self.payload.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    /// Log summary: `run.started run=run-abc seq=3`.
    pub fn log_summary(&self) -> String {
        format!("{} run={} seq={}", self.event_type, self.run_id, self.seq)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
