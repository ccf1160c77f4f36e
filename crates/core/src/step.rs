// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived run step projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::EventKind;
use crate::run::RunId;

/// Default `kind` for a step first seen without one.
pub const DEFAULT_STEP_KIND: &str = "step";

/// Status of a derived step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

crate::string_enum! {
    StepStatus {
        Pending => "pending",
        Running => "running",
        Retrying => "retrying",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl StepStatus {
    /// Status implied by the event type when the payload carries none.
    pub fn implied_by(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::StepStarted => Some(StepStatus::Running),
            EventKind::StepCompleted => Some(StepStatus::Completed),
            EventKind::StepFailed => Some(StepStatus::Failed),
            EventKind::StepRetrying => Some(StepStatus::Retrying),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled)
    }
}

/// One logical unit of work inside a run, folded from `step.*` events.
///
/// Never written directly: the store rebuilds it from the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStep {
    pub id: String,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_step_id: Option<String>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: StepStatus,
    #[serde(default)]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_decision: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Seq of the last event folded into this step.
    #[serde(default)]
    pub last_seq: u64,
}

impl RunStep {
    /// A step on first sight: pending, default kind, no attempts.
    pub fn new(run_id: RunId, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            run_id,
            parent_step_id: None,
            kind: DEFAULT_STEP_KIND.to_string(),
            name: None,
            status: StepStatus::Pending,
            attempt: 0,
            policy_decision: None,
            dependencies: Vec::new(),
            diagnostics: None,
            error: None,
            started_at: None,
            updated_at: None,
            last_seq: 0,
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
