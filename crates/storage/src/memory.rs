// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`Store`] implementation.
//!
//! One mutex guards every table, so sequence allocation, the append and the
//! projection fold happen as a single step per call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tl_core::{
    Artifact, Automation, AutomationId, AutomationInboxEntry, InboxEntryId, Run, RunEvent, RunId,
    RunMessage, RunProcess, RunStep,
};

use crate::projection::RunProjection;
use crate::snapshot::{load_snapshot, save_snapshot, Snapshot, CURRENT_SNAPSHOT_VERSION};
use crate::store::{InboxFilter, RunFilter, Store};
use crate::StoreError;

#[derive(Debug, Default)]
struct Tables {
    runs: HashMap<RunId, RunProjection>,
    events: HashMap<RunId, Vec<RunEvent>>,
    messages: HashMap<RunId, Vec<RunMessage>>,
    artifacts: HashMap<RunId, Vec<Artifact>>,
    automations: HashMap<AutomationId, Automation>,
    inbox: HashMap<InboxEntryId, AutomationInboxEntry>,
}

impl Tables {
    fn next_seq(&self, run_id: &RunId) -> u64 {
        self.events.get(run_id).and_then(|log| log.last()).map_or(1, |e| e.seq + 1)
    }

    fn projection(&self, run_id: &RunId) -> Result<&RunProjection, StoreError> {
        self.runs.get(run_id).ok_or_else(|| StoreError::not_found("run", run_id))
    }
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture raw logs and tables. Projections are not included.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        let tables = self.tables.lock();
        let mut runs: Vec<Run> = tables.runs.values().map(|p| p.run.clone()).collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let events = runs
            .iter()
            .flat_map(|run| tables.events.get(&run.id).into_iter().flatten().cloned())
            .collect();
        let messages = runs
            .iter()
            .flat_map(|run| tables.messages.get(&run.id).into_iter().flatten().cloned())
            .collect();
        let artifacts = runs
            .iter()
            .flat_map(|run| tables.artifacts.get(&run.id).into_iter().flatten().cloned())
            .collect();
        let mut automations: Vec<Automation> = tables.automations.values().cloned().collect();
        automations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let mut inbox: Vec<AutomationInboxEntry> = tables.inbox.values().cloned().collect();
        inbox.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));

        Snapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            created_at: now,
            runs,
            events,
            messages,
            artifacts,
            automations,
            inbox,
        }
    }

    /// Rebuild a store from a snapshot, replaying every event log.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut tables = Tables::default();
        let mut logs: HashMap<RunId, Vec<RunEvent>> = HashMap::new();
        for event in snapshot.events {
            logs.entry(event.run_id.clone()).or_default().push(event);
        }
        for run in snapshot.runs {
            let log = logs.remove(&run.id).unwrap_or_default();
            let projection = RunProjection::replay(run, &log)?;
            tables.events.insert(projection.run.id.clone(), log);
            tables.runs.insert(projection.run.id.clone(), projection);
        }
        for (run_id, log) in logs {
            tracing::warn!(run_id = %run_id, events = log.len(), "dropping events for unknown run");
        }
        for message in snapshot.messages {
            tables.messages.entry(message.run_id.clone()).or_default().push(message);
        }
        for artifact in snapshot.artifacts {
            tables.artifacts.entry(artifact.run_id.clone()).or_default().push(artifact);
        }
        for automation in snapshot.automations {
            tables.automations.insert(automation.id.clone(), automation);
        }
        for entry in snapshot.inbox {
            tables.inbox.insert(entry.id.clone(), entry);
        }
        Ok(Self { tables: Arc::new(Mutex::new(tables)) })
    }

    /// Write a compressed snapshot to `path`.
    pub fn checkpoint(&self, path: &Path, now: DateTime<Utc>) -> Result<(), StoreError> {
        save_snapshot(path, &self.snapshot(now))
    }

    /// Load a store from `path`. `None` when there is no usable snapshot.
    pub fn restore(path: &Path) -> Result<Option<Self>, StoreError> {
        match load_snapshot(path)? {
            Some(snapshot) => {
                let store = Self::from_snapshot(snapshot)?;
                tracing::info!(path = %path.display(), runs = store.tables.lock().runs.len(), "restored snapshot");
                Ok(Some(store))
            }
            None => Ok(None),
        }
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, String)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn truncate<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn next_seq(&self, run_id: &RunId) -> Result<u64, StoreError> {
        let tables = self.tables.lock();
        tables.projection(run_id)?;
        Ok(tables.next_seq(run_id))
    }

    async fn append_event(&self, mut event: RunEvent) -> Result<RunEvent, StoreError> {
        let mut guard = self.tables.lock();
        let expected = guard.next_seq(&event.run_id);
        let tables = &mut *guard;
        let projection = tables
            .runs
            .get_mut(&event.run_id)
            .ok_or_else(|| StoreError::not_found("run", &event.run_id))?;

        if event.seq == 0 {
            event.seq = expected;
        } else if event.seq != expected {
            return Err(StoreError::Conflict(format!(
                "seq {} for {} (next is {expected})",
                event.seq, event.run_id
            )));
        }

        projection.apply_event(&event)?;
        tables.events.entry(event.run_id.clone()).or_default().push(event.clone());
        Ok(event)
    }

    async fn list_events(&self, run_id: &RunId, after_seq: u64) -> Result<Vec<RunEvent>, StoreError> {
        let tables = self.tables.lock();
        tables.projection(run_id)?;
        Ok(tables
            .events
            .get(run_id)
            .map(|log| log.iter().filter(|e| e.seq > after_seq).cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_run(&self, mut run: Run) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        match tables.runs.get_mut(&run.id) {
            Some(existing) => {
                existing.run.prompt = run.prompt;
                if run.automation_id.is_some() {
                    existing.run.automation_id = run.automation_id;
                }
            }
            None => {
                run.reset_derived();
                tables.runs.insert(run.id.clone(), RunProjection::new(run));
            }
        }
        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.tables.lock().runs.get(run_id).map(|p| p.run.clone()))
    }

    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<Run>, StoreError> {
        let tables = self.tables.lock();
        let mut runs: Vec<Run> =
            tables.runs.values().map(|p| &p.run).filter(|r| filter.matches(r)).cloned().collect();
        newest_first(&mut runs, |r| (r.created_at, r.id.to_string()));
        Ok(truncate(runs, filter.limit))
    }

    async fn list_steps(&self, run_id: &RunId) -> Result<Vec<RunStep>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.projection(run_id)?.steps.values().cloned().collect())
    }

    async fn get_step(&self, run_id: &RunId, step_id: &str) -> Result<Option<RunStep>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.projection(run_id)?.step(step_id).cloned())
    }

    async fn list_processes(&self, run_id: &RunId) -> Result<Vec<RunProcess>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.projection(run_id)?.processes.values().cloned().collect())
    }

    async fn append_message(&self, message: RunMessage) -> Result<RunMessage, StoreError> {
        let mut tables = self.tables.lock();
        tables.projection(&message.run_id)?;
        tables.messages.entry(message.run_id.clone()).or_default().push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, run_id: &RunId) -> Result<Vec<RunMessage>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.messages.get(run_id).cloned().unwrap_or_default())
    }

    async fn add_artifact(&self, artifact: Artifact) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.projection(&artifact.run_id)?;
        tables.artifacts.entry(artifact.run_id.clone()).or_default().push(artifact);
        Ok(())
    }

    async fn list_artifacts(&self, run_id: &RunId) -> Result<Vec<Artifact>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.artifacts.get(run_id).cloned().unwrap_or_default())
    }

    async fn upsert_automation(&self, automation: Automation) -> Result<(), StoreError> {
        self.tables.lock().automations.insert(automation.id.clone(), automation);
        Ok(())
    }

    async fn get_automation(&self, id: &AutomationId) -> Result<Option<Automation>, StoreError> {
        Ok(self.tables.lock().automations.get(id).cloned())
    }

    async fn list_automations(&self) -> Result<Vec<Automation>, StoreError> {
        let tables = self.tables.lock();
        let mut automations: Vec<Automation> = tables.automations.values().cloned().collect();
        automations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(automations)
    }

    async fn delete_automation(&self, id: &AutomationId) -> Result<bool, StoreError> {
        Ok(self.tables.lock().automations.remove(id).is_some())
    }

    async fn create_inbox_entry(&self, entry: AutomationInboxEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if tables.inbox.contains_key(&entry.id) {
            return Err(StoreError::Conflict(format!("inbox entry {} already exists", entry.id)));
        }
        tables.inbox.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn update_inbox_entry(&self, entry: AutomationInboxEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let slot = tables
            .inbox
            .get_mut(&entry.id)
            .ok_or_else(|| StoreError::not_found("inbox entry", &entry.id))?;
        *slot = entry;
        Ok(())
    }

    async fn get_inbox_entry(&self, id: &InboxEntryId) -> Result<Option<AutomationInboxEntry>, StoreError> {
        Ok(self.tables.lock().inbox.get(id).cloned())
    }

    async fn list_inbox(&self, filter: &InboxFilter) -> Result<Vec<AutomationInboxEntry>, StoreError> {
        let tables = self.tables.lock();
        let mut entries: Vec<AutomationInboxEntry> =
            tables.inbox.values().filter(|e| filter.matches(e)).cloned().collect();
        newest_first(&mut entries, |e| (e.started_at, e.id.to_string()));
        Ok(truncate(entries, filter.limit))
    }

    async fn mark_inbox_read(&self, id: &InboxEntryId, read: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let entry = tables.inbox.get_mut(id).ok_or_else(|| StoreError::not_found("inbox entry", id))?;
        entry.unread = !read;
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
