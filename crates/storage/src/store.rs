// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The storage contract the engine depends on.

use async_trait::async_trait;
use tl_core::{
    Artifact, Automation, AutomationId, AutomationInboxEntry, InboxEntryId, InboxStatus, Run,
    RunEvent, RunId, RunMessage, RunProcess, RunStatus, RunStep,
};

use crate::StoreError;

/// Filter for [`Store::list_runs`]. Results are newest-first by creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub automation_id: Option<AutomationId>,
    pub limit: Option<usize>,
}

impl RunFilter {
    pub fn with_status(status: RunStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn matches(&self, run: &Run) -> bool {
        self.status.map_or(true, |s| run.status == s)
            && self.automation_id.as_ref().map_or(true, |a| run.automation_id.as_ref() == Some(a))
    }
}

/// Filter for [`Store::list_inbox`]. Results are newest-first by start time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxFilter {
    pub automation_id: Option<AutomationId>,
    pub status: Option<InboxStatus>,
    pub unread_only: bool,
    pub limit: Option<usize>,
}

impl InboxFilter {
    pub fn for_automation(id: AutomationId) -> Self {
        Self { automation_id: Some(id), ..Self::default() }
    }

    pub fn matches(&self, entry: &AutomationInboxEntry) -> bool {
        self.automation_id.as_ref().map_or(true, |a| &entry.automation_id == a)
            && self.status.map_or(true, |s| entry.status == s)
            && (!self.unread_only || entry.unread)
    }
}

/// Durable state for runs, their event logs, and automations.
///
/// Runs, steps and processes returned by the store reflect every event
/// appended so far: `append_event` folds the event into the projections
/// atomically with the append.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Seq the next appended event for `run_id` will receive.
    async fn next_seq(&self, run_id: &RunId) -> Result<u64, StoreError>;

    /// Append an event. A zero `seq` is assigned; a non-zero one must equal
    /// [`Store::next_seq`] or the append fails with `Conflict`.
    async fn append_event(&self, event: RunEvent) -> Result<RunEvent, StoreError>;

    /// Events with `seq > after_seq`, ascending.
    async fn list_events(&self, run_id: &RunId, after_seq: u64) -> Result<Vec<RunEvent>, StoreError>;

    /// Create a run or update its descriptive fields. Event-derived fields
    /// of an existing run are kept.
    async fn upsert_run(&self, run: Run) -> Result<(), StoreError>;
    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>, StoreError>;
    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<Run>, StoreError>;

    async fn list_steps(&self, run_id: &RunId) -> Result<Vec<RunStep>, StoreError>;
    async fn get_step(&self, run_id: &RunId, step_id: &str) -> Result<Option<RunStep>, StoreError>;
    async fn list_processes(&self, run_id: &RunId) -> Result<Vec<RunProcess>, StoreError>;

    async fn append_message(&self, message: RunMessage) -> Result<RunMessage, StoreError>;
    async fn list_messages(&self, run_id: &RunId) -> Result<Vec<RunMessage>, StoreError>;

    async fn add_artifact(&self, artifact: Artifact) -> Result<(), StoreError>;
    async fn list_artifacts(&self, run_id: &RunId) -> Result<Vec<Artifact>, StoreError>;

    async fn upsert_automation(&self, automation: Automation) -> Result<(), StoreError>;
    async fn get_automation(&self, id: &AutomationId) -> Result<Option<Automation>, StoreError>;
    /// All automations, oldest first.
    async fn list_automations(&self) -> Result<Vec<Automation>, StoreError>;
    /// Returns whether the automation existed.
    async fn delete_automation(&self, id: &AutomationId) -> Result<bool, StoreError>;

    /// Fails with `Conflict` if an entry with the same id exists.
    async fn create_inbox_entry(&self, entry: AutomationInboxEntry) -> Result<(), StoreError>;
    /// Fails with `NotFound` if the entry does not exist.
    async fn update_inbox_entry(&self, entry: AutomationInboxEntry) -> Result<(), StoreError>;
    async fn get_inbox_entry(&self, id: &InboxEntryId) -> Result<Option<AutomationInboxEntry>, StoreError>;
    async fn list_inbox(&self, filter: &InboxFilter) -> Result<Vec<AutomationInboxEntry>, StoreError>;
    /// Set the read state without touching the rest of the entry.
    async fn mark_inbox_read(&self, id: &InboxEntryId, read: bool) -> Result<(), StoreError>;
}
