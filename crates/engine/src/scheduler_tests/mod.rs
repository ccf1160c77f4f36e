// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler tests against a real run manager with fake activities.

mod due;
mod flight;
mod manage;
mod reconcile;

use super::*;
use crate::error::{RunError, SchedulerError};
use crate::launcher::{RunOutcome, StartRun};
use crate::manager::{RunConfig, RunManager};
use crate::retry::RetryPolicy;
use crate::EventBroker;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tl_adapters::{ActivityError, ActivityKind, FakeActivityAdapter, FakeNotifyAdapter};
use tl_core::{
    Automation, AutomationId, AutomationSpec, CompletionReason, FakeClock, InboxStatus, RunId, RunPhase,
    RunStatus, Trigger,
};
use tl_storage::{InboxFilter, MemoryStore};

type TestManager = RunManager<MemoryStore, FakeActivityAdapter, FakeClock>;
type TestScheduler = AutomationScheduler<MemoryStore, TestManager, FakeNotifyAdapter, FakeClock>;

/// Sunday 2026-02-01 12:00 UTC
fn sunday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
}

fn spec(name: &str) -> AutomationSpec {
    AutomationSpec {
        name: name.to_string(),
        prompt: format!("{name} prompt"),
        days: ["mon", "tue", "wed", "thu", "fri"].iter().map(|d| d.to_string()).collect(),
        time_of_day: "09:00".to_string(),
        timezone: "UTC".to_string(),
        enabled: true,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    adapter: FakeActivityAdapter,
    notifier: FakeNotifyAdapter,
    clock: FakeClock,
    scheduler: TestScheduler,
}

impl Harness {
    fn new() -> Self {
        Self::at(sunday_noon())
    }

    fn at(now: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let adapter = FakeActivityAdapter::new();
        let notifier = FakeNotifyAdapter::new();
        let clock = FakeClock::at(now);
        let manager = RunManager::new(
            Arc::clone(&store),
            EventBroker::default(),
            adapter.clone(),
            clock.clone(),
            RunConfig { retry: RetryPolicy::immediate(1), deadline: None },
        );
        let scheduler = AutomationScheduler::new(
            Arc::clone(&store),
            manager,
            notifier.clone(),
            clock.clone(),
            SchedulerConfig::default(),
        );
        Self { store, adapter, notifier, clock, scheduler }
    }

    async fn create(&self, name: &str) -> Automation {
        self.scheduler.create_automation(&spec(name)).await.unwrap()
    }

    async fn automation(&self, id: &AutomationId) -> Automation {
        self.store.get_automation(id).await.unwrap().unwrap()
    }

    async fn inbox(&self, id: &AutomationId) -> Vec<tl_core::AutomationInboxEntry> {
        self.store.list_inbox(&InboxFilter::for_automation(id.clone())).await.unwrap()
    }
}

/// Launcher that refuses every run.
#[derive(Clone)]
struct RefusingLauncher;

#[async_trait]
impl RunLauncher for RefusingLauncher {
    async fn launch(&self, _request: StartRun) -> Result<RunId, RunError> {
        Err(RunError::Conflict("no capacity".to_string()))
    }

    async fn wait_outcome(&self, run_id: &RunId) -> Result<RunOutcome, RunError> {
        Err(RunError::NotFound(run_id.clone()))
    }
}

#[tokio::test]
async fn queued_execution_records_result_and_releases_flag() {
    let h = Harness::new();
    let automation = h.create("report").await;

    let outcome = h.scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap();
    assert!(outcome.queued);
    assert_eq!(outcome.reason, None);
    h.scheduler.wait_for_executions().await;

    let entries = h.inbox(&automation.id).await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(Some(&entry.id), outcome.inbox_entry_id.as_ref());
    assert_eq!(entry.status, InboxStatus::Completed);
    assert_eq!(entry.trigger, Trigger::Manual);
    assert!(entry.unread);
    assert_eq!(entry.error, None);
    let result = entry.result.as_ref().unwrap();
    assert_eq!(result.completion_reason, CompletionReason::Verified);
    assert_eq!(result.phase, RunPhase::Completed);
    assert_eq!(entry.run_id.as_ref(), Some(&result.run_id));

    let automation = h.automation(&automation.id).await;
    assert!(!automation.in_progress);
    assert_eq!(automation.in_progress_since, None);
    assert_eq!(automation.last_run_id.as_ref(), Some(&result.run_id));
    assert_eq!(automation.last_run_at, Some(sunday_noon()));

    let run = h.store.get_run(&result.run_id).await.unwrap().unwrap();
    assert_eq!(run.automation_id, Some(automation.id.clone()));
    assert_eq!(h.adapter.calls_mentioning("report prompt"), 3);
}

#[tokio::test]
async fn completion_sends_notification() {
    let h = Harness::new();
    let automation = h.create("report").await;

    h.scheduler.trigger_now(&automation.id).await.unwrap();
    h.scheduler.wait_for_executions().await;

    let calls = h.notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].title, "Automation: report");
    assert_eq!(calls[0].message, "completed: verified");
}

#[tokio::test]
async fn notification_failure_does_not_affect_inbox() {
    let h = Harness::new();
    h.notifier.set_failing(true);
    let automation = h.create("report").await;

    h.scheduler.trigger_now(&automation.id).await.unwrap();
    h.scheduler.wait_for_executions().await;

    assert_eq!(h.notifier.calls().len(), 1);
    assert_eq!(h.inbox(&automation.id).await[0].status, InboxStatus::Completed);
    assert!(!h.automation(&automation.id).await.in_progress);
}

#[tokio::test]
async fn failed_run_is_recorded_as_result() {
    let h = Harness::new();
    h.adapter.push_execute_result(Err(ActivityError::Terminal("broken".into())));
    let automation = h.create("report").await;

    h.scheduler.trigger_now(&automation.id).await.unwrap();
    h.scheduler.wait_for_executions().await;

    let entry = &h.inbox(&automation.id).await[0];
    assert_eq!(entry.status, InboxStatus::Failed);
    assert_eq!(entry.error, None);
    assert_eq!(entry.result.as_ref().map(|r| r.completion_reason.clone()), Some(CompletionReason::ActivityError));
    assert_eq!(h.notifier.calls()[0].message, "failed: activity_error");
}

#[tokio::test]
async fn second_queue_while_running_is_rejected() {
    let h = Harness::new();
    let gate = h.adapter.gate(ActivityKind::Plan);
    let automation = h.create("report").await;

    assert!(h.scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap().queued);
    gate.entered().await;

    let second = h.scheduler.queue_automation_execution(&automation.id, Trigger::Scheduled).await.unwrap();
    assert!(!second.queued);
    assert_eq!(second.reason.as_deref(), Some("already in progress"));
    assert_eq!(second.inbox_entry_id, None);

    let err = h.scheduler.trigger_now(&automation.id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Conflict { ref reason } if reason == "already in progress"));

    gate.release(1);
    h.scheduler.wait_for_executions().await;
    assert_eq!(h.inbox(&automation.id).await.len(), 1);
}

#[tokio::test]
async fn concurrent_queue_attempts_admit_one() {
    let h = Harness::new();
    let gate = h.adapter.gate(ActivityKind::Plan);
    let automation = h.create("report").await;

    let mut attempts = Vec::new();
    for _ in 0..10 {
        let scheduler = h.scheduler.clone();
        let id = automation.id.clone();
        attempts.push(tokio::spawn(async move {
            scheduler.queue_automation_execution(&id, Trigger::Scheduled).await.unwrap().queued
        }));
    }
    let mut queued = 0;
    for attempt in attempts {
        if attempt.await.unwrap() {
            queued += 1;
        }
    }
    assert_eq!(queued, 1);

    let running: Vec<_> = h.inbox(&automation.id).await.into_iter().filter(|e| e.is_running()).collect();
    assert_eq!(running.len(), 1);

    gate.release(1);
    h.scheduler.wait_for_executions().await;
}

#[tokio::test]
async fn disabled_automation_is_not_queued() {
    let h = Harness::new();
    let automation = h.create("report").await;
    h.scheduler.set_enabled(&automation.id, false).await.unwrap();

    let outcome = h.scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap();
    assert!(!outcome.queued);
    assert_eq!(outcome.reason.as_deref(), Some("disabled"));
    assert!(h.inbox(&automation.id).await.is_empty());
}

#[tokio::test]
async fn unknown_automation_is_not_found() {
    let h = Harness::new();
    let err = h.scheduler.queue_automation_execution(&AutomationId::new(), Trigger::Manual).await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}

#[tokio::test]
async fn launch_failure_records_error_and_releases_flag() {
    let h = Harness::new();
    let scheduler = AutomationScheduler::new(
        Arc::clone(&h.store),
        RefusingLauncher,
        h.notifier.clone(),
        h.clock.clone(),
        SchedulerConfig::default(),
    );
    let automation = scheduler.create_automation(&spec("report")).await.unwrap();

    scheduler.trigger_now(&automation.id).await.unwrap();
    scheduler.wait_for_executions().await;

    let entry = &h.inbox(&automation.id).await[0];
    assert_eq!(entry.status, InboxStatus::Failed);
    assert_eq!(entry.result, None);
    assert_eq!(entry.error.as_deref(), Some("failed to start run: conflict: no capacity"));
    assert_eq!(entry.run_id, None);
    assert!(!h.automation(&automation.id).await.in_progress);
    assert_eq!(h.notifier.calls()[0].message, "failed: failed to start run: conflict: no capacity");
}

#[tokio::test]
async fn deleted_automation_still_gets_its_inbox_entry_finished() {
    let h = Harness::new();
    let gate = h.adapter.gate(ActivityKind::Plan);
    let automation = h.create("report").await;

    h.scheduler.trigger_now(&automation.id).await.unwrap();
    gate.entered().await;
    assert!(h.scheduler.delete_automation(&automation.id).await.unwrap());
    gate.release(1);
    h.scheduler.wait_for_executions().await;

    assert!(h.store.get_automation(&automation.id).await.unwrap().is_none());
    assert_eq!(h.inbox(&automation.id).await[0].status, InboxStatus::Completed);
}

#[tokio::test]
async fn stale_completion_leaves_newer_flag_alone() {
    let h = Harness::new();
    let automation = h.create("report").await;

    let newer = sunday_noon() + chrono::Duration::minutes(5);
    let mut current = h.automation(&automation.id).await;
    current.begin_execution(newer);
    h.store.upsert_automation(current).await.unwrap();

    let mut finished = tl_core::AutomationInboxEntry::running(&automation, Trigger::Manual, sunday_noon());
    finished.finish_with_error("old", newer);
    h.scheduler.release_flight(&automation.id, &finished, newer).await;

    let after = h.automation(&automation.id).await;
    assert!(after.in_progress);
    assert_eq!(after.in_progress_since, Some(newer));
}

#[tokio::test]
async fn run_status_partial_maps_to_partial_entry() {
    let h = Harness::new();
    h.adapter.push_verify_result(Ok(tl_adapters::VerifyOutput::new("partial", "")));
    let automation = h.create("report").await;

    h.scheduler.trigger_now(&automation.id).await.unwrap();
    h.scheduler.wait_for_executions().await;

    let entry = &h.inbox(&automation.id).await[0];
    assert_eq!(entry.status, InboxStatus::Partial);
    let run_id = entry.run_id.clone().unwrap();
    assert_eq!(h.store.get_run(&run_id).await.unwrap().unwrap().status, RunStatus::Partial);
}
