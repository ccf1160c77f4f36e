// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-lived subprocesses owned by a run (dev servers, watchers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::event::EventKind;
use crate::run::RunId;

/// Last observed state of a run process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStatus {
    Starting,
    Running,
    Exited,
    Failed,
    Killed,
}

crate::string_enum! {
    ProcessStatus {
        Starting => "starting",
        Running => "running",
        Exited => "exited",
        Failed => "failed",
        Killed => "killed",
    }
}

impl ProcessStatus {
    /// Status implied by the event type when the payload carries none.
    pub fn implied_by(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::ProcessStarted => Some(ProcessStatus::Running),
            EventKind::ProcessExited => Some(ProcessStatus::Exited),
            _ => None,
        }
    }
}

/// Projection of one subprocess, folded from `process.*` events.
///
/// Fields only move forward; `status`, `exit_code` and `signal` always
/// reflect the latest observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProcess {
    pub process_id: String,
    pub run_id: RunId,
    pub status: ProcessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default)]
    pub preview_urls: BTreeSet<String>,
    /// Most recent output line reported by `process.output`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seq: u64,
}

impl RunProcess {
    pub fn new(run_id: RunId, process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            run_id,
            status: ProcessStatus::Starting,
            command: None,
            pid: None,
            exit_code: None,
            signal: None,
            preview_urls: BTreeSet::new(),
            last_output: None,
            started_at: None,
            updated_at: None,
            last_seq: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self.status, ProcessStatus::Starting | ProcessStatus::Running)
    }
}
