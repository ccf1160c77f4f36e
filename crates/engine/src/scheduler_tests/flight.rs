// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tl_core::{
    Artifact, AutomationInboxEntry, InboxEntryId, Run, RunEvent, RunMessage, RunProcess, RunStep,
};
use tl_storage::{RunFilter, Store, StoreError};

/// Memory store whose inbox refuses new entries.
struct InboxFullStore {
    inner: MemoryStore,
}

#[async_trait]
impl Store for InboxFullStore {
    async fn next_seq(&self, run_id: &RunId) -> Result<u64, StoreError> {
        self.inner.next_seq(run_id).await
    }
    async fn append_event(&self, event: RunEvent) -> Result<RunEvent, StoreError> {
        self.inner.append_event(event).await
    }
    async fn list_events(&self, run_id: &RunId, after_seq: u64) -> Result<Vec<RunEvent>, StoreError> {
        self.inner.list_events(run_id, after_seq).await
    }
    async fn upsert_run(&self, run: Run) -> Result<(), StoreError> {
        self.inner.upsert_run(run).await
    }
    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>, StoreError> {
        self.inner.get_run(run_id).await
    }
    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<Run>, StoreError> {
        self.inner.list_runs(filter).await
    }
    async fn list_steps(&self, run_id: &RunId) -> Result<Vec<RunStep>, StoreError> {
        self.inner.list_steps(run_id).await
    }
    async fn get_step(&self, run_id: &RunId, step_id: &str) -> Result<Option<RunStep>, StoreError> {
        self.inner.get_step(run_id, step_id).await
    }
    async fn list_processes(&self, run_id: &RunId) -> Result<Vec<RunProcess>, StoreError> {
        self.inner.list_processes(run_id).await
    }
    async fn append_message(&self, message: RunMessage) -> Result<RunMessage, StoreError> {
        self.inner.append_message(message).await
    }
    async fn list_messages(&self, run_id: &RunId) -> Result<Vec<RunMessage>, StoreError> {
        self.inner.list_messages(run_id).await
    }
    async fn add_artifact(&self, artifact: Artifact) -> Result<(), StoreError> {
        self.inner.add_artifact(artifact).await
    }
    async fn list_artifacts(&self, run_id: &RunId) -> Result<Vec<Artifact>, StoreError> {
        self.inner.list_artifacts(run_id).await
    }
    async fn upsert_automation(&self, automation: Automation) -> Result<(), StoreError> {
        self.inner.upsert_automation(automation).await
    }
    async fn get_automation(&self, id: &AutomationId) -> Result<Option<Automation>, StoreError> {
        self.inner.get_automation(id).await
    }
    async fn list_automations(&self) -> Result<Vec<Automation>, StoreError> {
        self.inner.list_automations().await
    }
    async fn delete_automation(&self, id: &AutomationId) -> Result<bool, StoreError> {
        self.inner.delete_automation(id).await
    }
    async fn create_inbox_entry(&self, _entry: AutomationInboxEntry) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
    async fn update_inbox_entry(&self, entry: AutomationInboxEntry) -> Result<(), StoreError> {
        self.inner.update_inbox_entry(entry).await
    }
    async fn get_inbox_entry(&self, id: &InboxEntryId) -> Result<Option<AutomationInboxEntry>, StoreError> {
        self.inner.get_inbox_entry(id).await
    }
    async fn list_inbox(&self, filter: &InboxFilter) -> Result<Vec<AutomationInboxEntry>, StoreError> {
        self.inner.list_inbox(filter).await
    }
    async fn mark_inbox_read(&self, id: &InboxEntryId, read: bool) -> Result<(), StoreError> {
        self.inner.mark_inbox_read(id, read).await
    }
}

#[tokio::test]
async fn inbox_failure_rolls_back_in_progress_flag() {
    let store = Arc::new(InboxFullStore { inner: MemoryStore::new() });
    let scheduler = AutomationScheduler::new(
        Arc::clone(&store),
        RefusingLauncher,
        FakeNotifyAdapter::new(),
        FakeClock::at(sunday_noon()),
        SchedulerConfig::default(),
    );
    let automation = scheduler.create_automation(&spec("report")).await.unwrap();

    let err = scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Store(StoreError::Io(_))));

    let after = store.get_automation(&automation.id).await.unwrap().unwrap();
    assert!(!after.in_progress);
    assert_eq!(after.in_progress_since, None);
    assert!(scheduler.executions.lock().is_empty());
    assert_eq!(scheduler.running_executions(), 0);
    assert!(store.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap().is_empty());

    let err = scheduler.trigger_now(&automation.id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Store(_)));
}
