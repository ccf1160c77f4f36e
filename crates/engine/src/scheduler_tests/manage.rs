// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn invalid_spec_is_rejected() {
    let h = Harness::new();
    let cases = [
        AutomationSpec { time_of_day: "25:00".to_string(), ..spec("x") },
        AutomationSpec { days: vec!["someday".to_string()], ..spec("x") },
        AutomationSpec { timezone: "Mars/Olympus".to_string(), ..spec("x") },
    ];
    for input in &cases {
        let err = h.scheduler.create_automation(input).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Schedule(_)), "{input:?}");
    }
    assert!(h.scheduler.list_automations().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_keeps_execution_state() {
    let h = Harness::new();
    let gate = h.adapter.gate(ActivityKind::Plan);
    let automation = h.create("report").await;
    h.scheduler.trigger_now(&automation.id).await.unwrap();
    gate.entered().await;

    let edited =
        AutomationSpec { prompt: "new prompt".to_string(), time_of_day: "17:30".to_string(), ..spec("report") };
    let updated = h.scheduler.update_automation(&automation.id, &edited).await.unwrap();
    assert_eq!(updated.prompt, "new prompt");
    assert!(updated.in_progress);
    assert_eq!(updated.next_run_at, Some(Utc.with_ymd_and_hms(2026, 2, 2, 17, 30, 0).unwrap()));

    gate.release(1);
    h.scheduler.wait_for_executions().await;
    assert!(!h.automation(&automation.id).await.in_progress);
}

#[tokio::test]
async fn invalid_update_leaves_automation_untouched() {
    let h = Harness::new();
    let automation = h.create("report").await;

    let broken = AutomationSpec { time_of_day: "9am".to_string(), ..spec("report") };
    assert!(h.scheduler.update_automation(&automation.id, &broken).await.is_err());
    assert_eq!(h.scheduler.get_automation(&automation.id).await.unwrap(), automation);
}

#[tokio::test]
async fn sync_matches_by_name() {
    let h = Harness::new();
    let first = h.scheduler.sync_automation(&spec("report")).await.unwrap();
    let changed = AutomationSpec { prompt: "changed".to_string(), ..spec("report") };
    let second = h.scheduler.sync_automation(&changed).await.unwrap();

    assert_eq!(first.id, second.id);
    let all = h.scheduler.list_automations().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].prompt, "changed");
}

#[tokio::test]
async fn toggling_recomputes_next_run() {
    let h = Harness::new();
    let automation = h.create("report").await;

    let disabled = h.scheduler.set_enabled(&automation.id, false).await.unwrap();
    assert!(!disabled.enabled);
    assert_eq!(disabled.next_run_at, None);

    let enabled = h.scheduler.set_enabled(&automation.id, true).await.unwrap();
    assert_eq!(enabled.next_run_at, automation.next_run_at);
}

#[tokio::test]
async fn delete_keeps_inbox_history() {
    let h = Harness::new();
    let automation = h.create("report").await;
    h.scheduler.trigger_now(&automation.id).await.unwrap();
    h.scheduler.wait_for_executions().await;

    assert!(h.scheduler.delete_automation(&automation.id).await.unwrap());
    assert!(!h.scheduler.delete_automation(&automation.id).await.unwrap());
    assert!(matches!(h.scheduler.get_automation(&automation.id).await, Err(SchedulerError::NotFound(_))));
    assert_eq!(h.scheduler.list_inbox(&InboxFilter::for_automation(automation.id.clone())).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unread_counts_follow_read_marks() {
    let h = Harness::new();
    let first = h.create("first").await;
    let second = h.create("second").await;
    let entry = h.scheduler.trigger_now(&first.id).await.unwrap();
    h.scheduler.trigger_now(&second.id).await.unwrap();
    h.scheduler.wait_for_executions().await;

    assert_eq!(h.scheduler.unread_count(None).await.unwrap(), 2);
    assert_eq!(h.scheduler.unread_count(Some(&first.id)).await.unwrap(), 1);

    h.scheduler.mark_inbox_read(&entry, true).await.unwrap();
    assert_eq!(h.scheduler.unread_count(Some(&first.id)).await.unwrap(), 0);
    assert_eq!(h.scheduler.unread_count(None).await.unwrap(), 1);

    h.scheduler.mark_inbox_read(&entry, false).await.unwrap();
    assert_eq!(h.scheduler.unread_count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn running_entries_are_not_unread() {
    let h = Harness::new();
    let gate = h.adapter.gate(ActivityKind::Plan);
    let automation = h.create("report").await;
    h.scheduler.trigger_now(&automation.id).await.unwrap();
    gate.entered().await;

    assert_eq!(h.scheduler.unread_count(None).await.unwrap(), 0);
    assert_eq!(h.scheduler.running_executions(), 1);

    gate.release(1);
    h.scheduler.wait_for_executions().await;
    assert_eq!(h.scheduler.running_executions(), 0);
    assert_eq!(h.scheduler.unread_count(None).await.unwrap(), 1);
}
