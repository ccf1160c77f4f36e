// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Automations (recurring schedules) and their inbox of outcomes.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::run::{CompletionReason, RunId, RunPhase, RunStatus};
use crate::schedule::{Schedule, ScheduleError, TimeOfDay, Weekday};

crate::define_id! {
    /// Unique identifier for an automation.
    pub struct AutomationId("aut-");
}

crate::define_id! {
    /// Unique identifier for one recorded automation outcome.
    pub struct InboxEntryId("inb-");
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// User-supplied automation definition (API input or config seed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationSpec {
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub days: Vec<String>,
    pub time_of_day: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AutomationSpec {
    /// Validate and normalize into a schedule.
    pub fn schedule(&self) -> Result<Schedule, ScheduleError> {
        Schedule::parse(&self.days, &self.time_of_day, &self.timezone)
    }
}

/// A recurring schedule that starts runs on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    pub name: String,
    pub prompt: String,
    pub days: Vec<Weekday>,
    pub time_of_day: TimeOfDay,
    pub timezone: Tz,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<RunId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Automation {
    /// Create from a spec, computing the first `next_run_at` after `now`.
    pub fn from_spec(spec: &AutomationSpec, now: DateTime<Utc>) -> Result<Self, ScheduleError> {
        let schedule = spec.schedule()?;
        let mut automation = Self {
            id: AutomationId::new(),
            name: spec.name.clone(),
            prompt: spec.prompt.clone(),
            days: schedule.days,
            time_of_day: schedule.time_of_day,
            timezone: schedule.timezone,
            enabled: spec.enabled,
            next_run_at: None,
            in_progress: false,
            in_progress_since: None,
            last_run_at: None,
            last_run_id: None,
            created_at: now,
            updated_at: now,
        };
        automation.refresh_next_run(now)?;
        Ok(automation)
    }

    /// Replace the user-editable fields and recompute `next_run_at`.
    ///
    /// Leaves `self` untouched when the spec is invalid.
    pub fn apply_spec(&mut self, spec: &AutomationSpec, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        let schedule = spec.schedule()?;
        let mut updated = self.clone();
        updated.name = spec.name.clone();
        updated.prompt = spec.prompt.clone();
        updated.days = schedule.days;
        updated.time_of_day = schedule.time_of_day;
        updated.timezone = schedule.timezone;
        updated.enabled = spec.enabled;
        updated.updated_at = now;
        updated.refresh_next_run(now)?;
        *self = updated;
        Ok(())
    }

    pub fn schedule(&self) -> Schedule {
        Schedule { days: self.days.clone(), time_of_day: self.time_of_day, timezone: self.timezone }
    }

    /// Recompute `next_run_at` from `reference`; cleared while disabled.
    pub fn refresh_next_run(&mut self, reference: DateTime<Utc>) -> Result<(), ScheduleError> {
        self.next_run_at = if self.enabled { Some(self.schedule().next_after(reference)?) } else { None };
        Ok(())
    }

    /// Mark an execution as acquired.
    pub fn begin_execution(&mut self, now: DateTime<Utc>) {
        self.in_progress = true;
        self.in_progress_since = Some(now);
        self.updated_at = now;
    }

    /// Release the single-flight flag.
    pub fn end_execution(&mut self, now: DateTime<Utc>) {
        self.in_progress = false;
        self.in_progress_since = None;
        self.updated_at = now;
    }
}

crate::builder! {
    pub struct AutomationBuilder => Automation {
        into {
            id: AutomationId = AutomationId::new(),
            name: String = "daily-report",
            prompt: String = "summarize yesterday",
        }
        set {
            days: Vec<Weekday> = Weekday::WORKDAYS.to_vec(),
            time_of_day: TimeOfDay = TimeOfDay { hour: 9, minute: 0 },
            timezone: Tz = Tz::UTC,
            enabled: bool = true,
            in_progress: bool = false,
            created_at: DateTime<Utc> = DateTime::<Utc>::default(),
            updated_at: DateTime<Utc> = DateTime::<Utc>::default(),
        }
        option {
            next_run_at: DateTime<Utc> = None,
            in_progress_since: DateTime<Utc> = None,
            last_run_at: DateTime<Utc> = None,
            last_run_id: RunId = None,
        }
    }
}

/// Outcome status of one automation execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboxStatus {
    Running,
    Completed,
    Partial,
    Failed,
    Cancelled,
}

crate::string_enum! {
    InboxStatus {
        Running => "running",
        Completed => "completed",
        Partial => "partial",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl From<RunStatus> for InboxStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Running => InboxStatus::Running,
            RunStatus::Completed => InboxStatus::Completed,
            RunStatus::Partial => InboxStatus::Partial,
            RunStatus::Failed => InboxStatus::Failed,
            RunStatus::Cancelled => InboxStatus::Cancelled,
        }
    }
}

/// What started an automation execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Scheduled,
    Manual,
}

crate::string_enum! {
    Trigger {
        Scheduled => "scheduled",
        Manual => "manual",
    }
}

/// Success payload of a finished execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxResult {
    pub run_id: RunId,
    pub phase: RunPhase,
    pub completion_reason: CompletionReason,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

/// One recorded execution of an automation.
///
/// A finished entry carries either `result` or a non-empty `error`, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationInboxEntry {
    pub id: InboxEntryId,
    pub automation_id: AutomationId,
    pub automation_name: String,
    pub status: InboxStatus,
    pub trigger: Trigger,
    pub unread: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<InboxResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl AutomationInboxEntry {
    /// A fresh `running` entry for an execution that was just acquired.
    pub fn running(automation: &Automation, trigger: Trigger, now: DateTime<Utc>) -> Self {
        Self {
            id: InboxEntryId::new(),
            automation_id: automation.id.clone(),
            automation_name: automation.name.clone(),
            status: InboxStatus::Running,
            trigger,
            unread: false,
            run_id: None,
            result: None,
            error: None,
            started_at: now,
            finished_at: None,
        }
    }

    /// Record the orchestrator's reported outcome.
    pub fn finish_with_result(&mut self, status: RunStatus, result: InboxResult, now: DateTime<Utc>) {
        self.status = status.into();
        self.run_id = Some(result.run_id.clone());
        self.result = Some(result);
        self.error = None;
        self.unread = true;
        self.finished_at = Some(now);
    }

    /// Record a failure. An empty message is replaced so `error` is never blank.
    pub fn finish_with_error(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        let error = error.into();
        self.status = InboxStatus::Failed;
        self.result = None;
        self.error = Some(if error.trim().is_empty() { "unknown error".to_string() } else { error });
        self.unread = true;
        self.finished_at = Some(now);
    }

    pub fn is_running(&self) -> bool {
        self.status == InboxStatus::Running
    }

    /// One-line outcome for notifications.
    pub fn summary(&self) -> String {
        match (&self.result, &self.error) {
            (_, Some(error)) => error.clone(),
            (Some(result), None) => result.completion_reason.to_string(),
            (None, None) => "in progress".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "automation_tests.rs"]
mod tests;
