// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifier, status, phase, and the derived run record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::automation::AutomationId;

crate::define_id! {
    /// Unique identifier for one orchestrated run.
    pub struct RunId("run-");
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Running,
    Completed,
    Partial,
    Failed,
    Cancelled,
}

crate::string_enum! {
    RunStatus {
        Running => "running",
        Completed => "completed",
        Partial => "partial",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl RunStatus {
    /// Terminal runs accept no further signals.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Phase a run settles in when it reaches this status.
    pub fn terminal_phase(&self) -> RunPhase {
        match self {
            RunStatus::Running => RunPhase::Running,
            RunStatus::Completed | RunStatus::Partial => RunPhase::Completed,
            RunStatus::Failed => RunPhase::Failed,
            RunStatus::Cancelled => RunPhase::Cancelled,
        }
    }
}

/// The orchestrator's current position within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Planning,
    Running,
    Executing,
    Verifying,
    Completed,
    Failed,
    Cancelled,
}

crate::string_enum! {
    RunPhase {
        Planning => "planning",
        Running => "running",
        Executing => "executing",
        Verifying => "verifying",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Why a run ended the way it did.
///
/// Known reasons get their own variant; anything else reported by a
/// verification activity is carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompletionReason {
    Verified,
    PartiallyVerified,
    VerificationFailed,
    ActivityError,
    UserCancelled,
    Timeout,
    Other(String),
}

impl CompletionReason {
    pub fn as_str(&self) -> &str {
        match self {
            CompletionReason::Verified => "verified",
            CompletionReason::PartiallyVerified => "partially_verified",
            CompletionReason::VerificationFailed => "verification_failed",
            CompletionReason::ActivityError => "activity_error",
            CompletionReason::UserCancelled => "user_cancelled",
            CompletionReason::Timeout => "timeout",
            CompletionReason::Other(s) => s,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "verified" => CompletionReason::Verified,
            "partially_verified" => CompletionReason::PartiallyVerified,
            "verification_failed" => CompletionReason::VerificationFailed,
            "activity_error" => CompletionReason::ActivityError,
            "user_cancelled" => CompletionReason::UserCancelled,
            "timeout" => CompletionReason::Timeout,
            other => CompletionReason::Other(other.to_string()),
        }
    }

    /// Reason used when a terminal event carries none.
    pub fn fallback_for(status: RunStatus) -> Option<Self> {
        match status {
            RunStatus::Failed => Some(CompletionReason::ActivityError),
            RunStatus::Cancelled => Some(CompletionReason::UserCancelled),
            _ => None,
        }
    }
}

impl From<String> for CompletionReason {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for CompletionReason {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<CompletionReason> for String {
    fn from(r: CompletionReason) -> Self {
        r.as_str().to_string()
    }
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome produced when a run's control loop exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub completion_reason: CompletionReason,
}

impl RunResult {
    pub fn new(status: RunStatus, completion_reason: CompletionReason) -> Self {
        Self { status, completion_reason }
    }

    pub fn cancelled() -> Self {
        Self::new(RunStatus::Cancelled, CompletionReason::UserCancelled)
    }

    pub fn failed(reason: CompletionReason) -> Self {
        Self::new(RunStatus::Failed, reason)
    }
}

/// One orchestrated task.
///
/// `status`, `phase`, `completion_reason`, `checkpoint_seq`, `resumed_from`
/// and `updated_at` are derived from the run's event log; the remaining
/// fields are written once when the run is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub prompt: String,
    pub status: RunStatus,
    pub phase: RunPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<CompletionReason>,
    #[serde(default)]
    pub checkpoint_seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<AutomationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    pub fn new(id: RunId, prompt: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            status: RunStatus::Running,
            phase: RunPhase::Planning,
            completion_reason: None,
            checkpoint_seq: 0,
            resumed_from: None,
            automation_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Clear every event-derived field so the log can be folded from scratch.
    pub fn reset_derived(&mut self) {
        self.status = RunStatus::Running;
        self.phase = RunPhase::Planning;
        self.completion_reason = None;
        self.checkpoint_seq = 0;
        self.resumed_from = None;
        self.updated_at = self.created_at;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Result view of a terminal run.
    pub fn result(&self) -> Option<RunResult> {
        if !self.is_terminal() {
            return None;
        }
        let reason = self
            .completion_reason
            .clone()
            .or_else(|| CompletionReason::fallback_for(self.status))
            .unwrap_or(CompletionReason::Other(String::new()));
        Some(RunResult::new(self.status, reason))
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
