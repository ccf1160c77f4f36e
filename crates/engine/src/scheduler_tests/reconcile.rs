// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::scheduler::reconcile::{INTERRUPTED_ERROR, LEASE_EXPIRED_ERROR};

/// Mark the automation in progress since `since` with a running inbox entry.
async fn strand(h: &Harness, automation: &Automation, since: DateTime<Utc>) -> tl_core::InboxEntryId {
    let mut stuck = h.automation(&automation.id).await;
    stuck.begin_execution(since);
    h.store.upsert_automation(stuck.clone()).await.unwrap();
    let entry = tl_core::AutomationInboxEntry::running(&stuck, Trigger::Scheduled, since);
    h.store.create_inbox_entry(entry.clone()).await.unwrap();
    entry.id
}

#[tokio::test]
async fn stale_flag_is_cleared_and_entry_failed() {
    let h = Harness::new();
    let automation = h.create("report").await;
    let entry_id = strand(&h, &automation, sunday_noon() - chrono::Duration::hours(7)).await;

    let report = h.scheduler.reconcile_stale().await.unwrap();
    assert_eq!(report.cleared, vec![automation.id.clone()]);
    assert_eq!(report.expired_entries, vec![entry_id.clone()]);

    let after = h.automation(&automation.id).await;
    assert!(!after.in_progress);
    assert_eq!(after.in_progress_since, None);
    assert!(after.next_run_at.is_some());

    let entry = h.store.get_inbox_entry(&entry_id).await.unwrap().unwrap();
    assert_eq!(entry.status, InboxStatus::Failed);
    assert_eq!(entry.error.as_deref(), Some(LEASE_EXPIRED_ERROR));
    assert!(entry.unread);
}

#[tokio::test]
async fn fresh_flag_is_left_alone() {
    let h = Harness::new();
    let automation = h.create("report").await;
    strand(&h, &automation, sunday_noon() - chrono::Duration::hours(1)).await;

    let report = h.scheduler.reconcile_stale().await.unwrap();
    assert!(report.is_empty());
    assert!(h.automation(&automation.id).await.in_progress);
}

#[tokio::test]
async fn lease_is_configurable() {
    let h = Harness::new();
    let scheduler = AutomationScheduler::new(
        Arc::clone(&h.store),
        RefusingLauncher,
        h.notifier.clone(),
        h.clock.clone(),
        SchedulerConfig { execution_lease: std::time::Duration::from_secs(60), ..SchedulerConfig::default() },
    );
    let automation = h.create("report").await;
    strand(&h, &automation, sunday_noon() - chrono::Duration::minutes(2)).await;

    let report = scheduler.reconcile_stale().await.unwrap();
    assert_eq!(report.cleared.len(), 1);
}

#[tokio::test]
async fn restart_reclaim_fails_entry_without_run_and_clears_fresh_flag() {
    let h = Harness::new();
    let automation = h.create("report").await;
    let entry_id = strand(&h, &automation, sunday_noon() - chrono::Duration::minutes(1)).await;

    let report = h.scheduler.reclaim_after_restart().await.unwrap();
    assert_eq!(report.cleared, vec![automation.id.clone()]);
    assert_eq!(report.expired_entries, vec![entry_id.clone()]);
    assert!(report.reattached.is_empty());

    let entry = h.store.get_inbox_entry(&entry_id).await.unwrap().unwrap();
    assert_eq!(entry.status, InboxStatus::Failed);
    assert_eq!(entry.error.as_deref(), Some(INTERRUPTED_ERROR));

    let outcome = h.scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap();
    assert!(outcome.queued);
    h.scheduler.wait_for_executions().await;
}

#[tokio::test]
async fn restart_reclaim_reattaches_entry_to_its_run() {
    let h = Harness::new();
    let gate = h.adapter.gate(ActivityKind::Plan);
    let automation = h.create("report").await;
    let entry_id = strand(&h, &automation, sunday_noon() - chrono::Duration::minutes(1)).await;
    let run_id = h.scheduler.launcher.start_run(StartRun::new("report prompt")).await.unwrap();
    let mut entry = h.store.get_inbox_entry(&entry_id).await.unwrap().unwrap();
    entry.run_id = Some(run_id.clone());
    h.store.update_inbox_entry(entry).await.unwrap();
    gate.entered().await;

    let report = h.scheduler.reclaim_after_restart().await.unwrap();
    assert_eq!(report.reattached, vec![entry_id.clone()]);
    assert!(report.cleared.is_empty());
    assert!(h.automation(&automation.id).await.in_progress);

    gate.release(1);
    h.scheduler.wait_for_executions().await;

    let entry = h.store.get_inbox_entry(&entry_id).await.unwrap().unwrap();
    assert_eq!(entry.status, InboxStatus::Completed);
    assert_eq!(entry.result.as_ref().map(|r| r.run_id.clone()), Some(run_id.clone()));
    let after = h.automation(&automation.id).await;
    assert!(!after.in_progress);
    assert_eq!(after.last_run_id, Some(run_id));
    assert_eq!(h.notifier.calls().len(), 1);
}

#[tokio::test]
async fn restart_reclaim_clears_flag_with_no_entry() {
    let h = Harness::new();
    let automation = h.create("report").await;
    let mut stuck = h.automation(&automation.id).await;
    stuck.begin_execution(sunday_noon());
    h.store.upsert_automation(stuck).await.unwrap();

    let report = h.scheduler.reclaim_after_restart().await.unwrap();
    assert_eq!(report.cleared, vec![automation.id.clone()]);
    assert!(report.expired_entries.is_empty());
    assert!(!h.automation(&automation.id).await.in_progress);

    assert!(h.scheduler.reclaim_after_restart().await.unwrap().is_empty());
}

#[tokio::test]
async fn force_clear_reports_whether_flag_was_set() {
    let h = Harness::new();
    let automation = h.create("report").await;

    assert!(!h.scheduler.force_clear_in_progress(&automation.id).await.unwrap());

    strand(&h, &automation, sunday_noon()).await;
    assert!(h.scheduler.force_clear_in_progress(&automation.id).await.unwrap());
    assert!(!h.automation(&automation.id).await.in_progress);

    let outcome = h.scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap();
    assert!(outcome.queued);
    h.scheduler.wait_for_executions().await;
}

#[tokio::test]
async fn force_clear_unknown_automation_is_not_found() {
    let h = Harness::new();
    let err = h.scheduler.force_clear_in_progress(&AutomationId::new()).await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}
