// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn monday_nine() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn weekday_automation_created_on_sunday_runs_monday() {
    let h = Harness::new();
    let automation = h.create("standup").await;

    assert_eq!(automation.next_run_at, Some(monday_nine()));
    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 0);

    h.clock.set(monday_nine());
    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 1);
    h.scheduler.wait_for_executions().await;

    let entries = h.inbox(&automation.id).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].trigger, Trigger::Scheduled);
    assert_eq!(entries[0].started_at, monday_nine());

    let after = h.automation(&automation.id).await;
    assert_eq!(after.next_run_at, Some(monday_nine() + chrono::Duration::days(1)));
}

#[tokio::test]
async fn finished_slot_is_not_queued_twice() {
    let h = Harness::at(monday_nine());
    let automation = h.create("standup").await;
    // Created exactly on the slot, so the stored next run is tomorrow.
    assert_eq!(automation.next_run_at, Some(monday_nine() + chrono::Duration::days(1)));

    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 1);
    h.scheduler.wait_for_executions().await;

    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 0);
    h.clock.advance(std::time::Duration::from_secs(30));
    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 0);
    assert_eq!(h.inbox(&automation.id).await.len(), 1);
}

#[tokio::test]
async fn missed_slot_is_picked_up_late() {
    let h = Harness::new();
    let automation = h.create("standup").await;

    // Daemon was down through Monday's slot and comes back mid-afternoon.
    h.clock.set(monday_nine() + chrono::Duration::hours(6));
    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 1);
    h.scheduler.wait_for_executions().await;

    let after = h.automation(&automation.id).await;
    assert_eq!(after.last_run_at, Some(monday_nine() + chrono::Duration::hours(6)));
    assert_eq!(after.next_run_at, Some(monday_nine() + chrono::Duration::days(1)));
    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 0);
}

#[tokio::test]
async fn disabled_and_busy_automations_are_skipped() {
    let h = Harness::new();
    let gate = h.adapter.gate(ActivityKind::Plan);
    let idle = h.create("idle").await;
    let disabled = h.create("disabled").await;
    let busy = h.create("busy").await;
    h.scheduler.set_enabled(&disabled.id, false).await.unwrap();
    h.scheduler.trigger_now(&busy.id).await.unwrap();
    gate.entered().await;

    h.clock.set(monday_nine());
    assert_eq!(h.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 1);
    gate.entered().await;

    assert_eq!(h.inbox(&idle.id).await.len(), 1);
    assert!(h.inbox(&disabled.id).await.is_empty());
    assert_eq!(h.inbox(&busy.id).await.len(), 1);
    assert_eq!(h.automation(&disabled.id).await.next_run_at, None);

    gate.release(2);
    h.scheduler.wait_for_executions().await;
}

#[tokio::test]
async fn poll_once_reconciles_before_scanning() {
    let h = Harness::new();
    let automation = h.create("standup").await;
    let mut stuck = h.automation(&automation.id).await;
    stuck.begin_execution(sunday_noon() - chrono::Duration::days(2));
    h.store.upsert_automation(stuck).await.unwrap();

    h.clock.set(monday_nine());
    assert_eq!(h.scheduler.poll_once().await, 1);
    h.scheduler.wait_for_executions().await;
    assert_eq!(h.inbox(&automation.id).await.len(), 1);
}

#[tokio::test]
async fn poll_loop_stops_on_cancel() {
    let store = Arc::new(MemoryStore::new());
    let clock = FakeClock::at(sunday_noon());
    let scheduler = AutomationScheduler::new(
        Arc::clone(&store),
        RefusingLauncher,
        FakeNotifyAdapter::new(),
        clock.clone(),
        SchedulerConfig { poll_interval: std::time::Duration::from_millis(10), ..SchedulerConfig::default() },
    );
    let automation = scheduler.create_automation(&spec("standup")).await.unwrap();
    clock.set(monday_nine());

    let token = tokio_util::sync::CancellationToken::new();
    let looping = {
        let scheduler = scheduler.clone();
        let token = token.clone();
        tokio::spawn(async move { scheduler.run_poll_loop(token).await })
    };

    for _ in 0..200 {
        let entries = store.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap();
        if entries.iter().any(|e| !e.is_running()) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    token.cancel();
    looping.await.unwrap();
    scheduler.wait_for_executions().await;

    let entries = store.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, InboxStatus::Failed);
}
