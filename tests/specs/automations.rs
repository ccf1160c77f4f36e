// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Automation scheduling scenarios.

use crate::prelude::*;

fn sunday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
}

fn monday_nine() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn weekday_schedule_created_on_sunday_fires_monday_morning() {
    let w = World::at(sunday_noon());
    let automation = w.scheduler.create_automation(&weekday_spec("standup", "09:00")).await.unwrap();
    assert_eq!(automation.next_run_at, Some(monday_nine()));

    assert_eq!(w.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 0);

    w.clock.set(monday_nine());
    assert_eq!(w.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 1);
    w.scheduler.wait_for_executions().await;

    let inbox = w.scheduler.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].status, InboxStatus::Completed);
    assert_eq!(inbox[0].trigger, Trigger::Scheduled);

    let run_id = inbox[0].run_id.clone().unwrap();
    let run = w.store.get_run(&run_id).await.unwrap().unwrap();
    assert_eq!(run.automation_id.as_ref(), Some(&automation.id));
    assert_eq!(run.status, RunStatus::Completed);

    let calls = w.notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].title, "Automation: standup");
    assert_eq!(calls[0].message, "completed: verified");

    let after = w.scheduler.get_automation(&automation.id).await.unwrap();
    assert_eq!(after.next_run_at, Some(monday_nine() + chrono::Duration::days(1)));
    assert_eq!(after.last_run_id, Some(run_id));
}

#[tokio::test]
async fn only_one_execution_in_flight_per_automation() {
    let w = World::at(monday_nine());
    let gate = w.adapter.gate(ActivityKind::Execute);
    let automation = w.scheduler.create_automation(&weekday_spec("report", "09:00")).await.unwrap();

    let first = w.scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap();
    assert!(first.queued);
    gate.entered().await;

    let second = w.scheduler.queue_automation_execution(&automation.id, Trigger::Manual).await.unwrap();
    assert!(!second.queued);
    assert_eq!(second.reason.as_deref(), Some("already in progress"));
    assert_eq!(w.scheduler.queue_due_automations(Trigger::Scheduled).await.unwrap(), 0);

    gate.release(1);
    w.scheduler.wait_for_executions().await;

    let inbox = w.scheduler.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(!w.scheduler.get_automation(&automation.id).await.unwrap().in_progress);
}

#[tokio::test]
async fn failed_run_still_releases_automation() {
    let w = World::at(sunday_noon());
    w.adapter.push_plan_result(Err(ActivityError::Terminal("no plan".into())));
    let automation = w.scheduler.create_automation(&weekday_spec("report", "09:00")).await.unwrap();

    w.scheduler.trigger_now(&automation.id).await.unwrap();
    w.scheduler.wait_for_executions().await;

    let inbox = w.scheduler.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap();
    assert_eq!(inbox[0].status, InboxStatus::Failed);
    assert_eq!(w.notifier.calls()[0].message, "failed: activity_error");

    w.scheduler.trigger_now(&automation.id).await.unwrap();
    w.scheduler.wait_for_executions().await;
    let inbox = w.scheduler.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap();
    assert_eq!(inbox.len(), 2);
    assert_eq!(w.scheduler.unread_count(Some(&automation.id)).await.unwrap(), 2);
}
