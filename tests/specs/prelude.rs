// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario tests.

pub use std::sync::Arc;
pub use std::time::Duration;

pub use chrono::{DateTime, TimeZone, Utc};
pub use tl_adapters::{ActivityError, ActivityKind, FakeActivityAdapter, FakeNotifyAdapter};
pub use tl_core::{
    AutomationSpec, CompletionReason, EventKind, FakeClock, InboxStatus, RunEvent, RunId, RunStatus, Trigger,
};
pub use tl_engine::{
    AutomationScheduler, EventBroker, RetryPolicy, RunConfig, RunError, RunManager, SchedulerConfig, StartRun,
};
pub use tl_storage::{InboxFilter, MemoryStore, Store};
pub use tokio_util::sync::CancellationToken;

pub type Manager = RunManager<MemoryStore, FakeActivityAdapter, FakeClock>;
pub type Scheduler = AutomationScheduler<MemoryStore, Manager, FakeNotifyAdapter, FakeClock>;

/// Everything a scenario needs, wired the way the daemon wires it but with fakes.
pub struct World {
    pub store: Arc<MemoryStore>,
    pub adapter: FakeActivityAdapter,
    pub notifier: FakeNotifyAdapter,
    pub clock: FakeClock,
    pub manager: Manager,
    pub scheduler: Scheduler,
}

impl World {
    pub fn at(now: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let adapter = FakeActivityAdapter::new();
        let notifier = FakeNotifyAdapter::new();
        let clock = FakeClock::at(now);
        let manager = RunManager::new(
            Arc::clone(&store),
            EventBroker::default(),
            adapter.clone(),
            clock.clone(),
            RunConfig { retry: RetryPolicy::immediate(3), deadline: Some(Duration::from_secs(30)) },
        );
        let scheduler = AutomationScheduler::new(
            Arc::clone(&store),
            manager.clone(),
            notifier.clone(),
            clock.clone(),
            SchedulerConfig::default(),
        );
        Self { store, adapter, notifier, clock, manager, scheduler }
    }

    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap())
    }

    pub async fn events(&self, run_id: &RunId) -> Vec<RunEvent> {
        self.store.list_events(run_id, 0).await.unwrap()
    }

    pub async fn event_types(&self, run_id: &RunId) -> Vec<String> {
        self.events(run_id).await.into_iter().map(|e| e.event_type).collect()
    }
}

pub fn weekday_spec(name: &str, time_of_day: &str) -> AutomationSpec {
    AutomationSpec {
        name: name.to_string(),
        prompt: format!("{name} prompt"),
        days: ["mon", "tue", "wed", "thu", "fri"].iter().map(|d| d.to_string()).collect(),
        time_of_day: time_of_day.to_string(),
        timezone: "UTC".to_string(),
        enabled: true,
    }
}
