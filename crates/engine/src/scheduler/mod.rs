// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Automation scheduler.
//!
//! Finds automations whose schedule has come due, starts one run per
//! execution, and records each outcome in the automation's inbox.
//!
//! At most one execution per automation is in flight. The `in_progress`
//! flag is the lease: it is only ever read-and-set under the scheduler's
//! flight lock, and an execution that cannot record its inbox entry rolls
//! the flag back before returning.

mod due;
mod execution;
mod flight;
mod manage;
mod reconcile;

pub use reconcile::{ReconcileReport, INTERRUPTED_ERROR, LEASE_EXPIRED_ERROR};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tl_adapters::NotifyAdapter;
use tl_core::{Clock, InboxEntryId};
use tl_storage::Store;
use tokio::task::JoinHandle;

use crate::launcher::RunLauncher;

/// How often the poll loop looks for due automations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How long an execution may hold the in-progress flag before
/// reconciliation treats it as abandoned.
pub const DEFAULT_EXECUTION_LEASE: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub execution_lease: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_POLL_INTERVAL, execution_lease: DEFAULT_EXECUTION_LEASE }
    }
}

/// Result of an attempt to queue one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOutcome {
    pub queued: bool,
    /// Why the execution was not queued.
    pub reason: Option<String>,
    pub inbox_entry_id: Option<InboxEntryId>,
}

impl QueueOutcome {
    fn queued(entry_id: InboxEntryId) -> Self {
        Self { queued: true, reason: None, inbox_entry_id: Some(entry_id) }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self { queued: false, reason: Some(reason.into()), inbox_entry_id: None }
    }
}

/// Schedules automation executions against a [`RunLauncher`].
pub struct AutomationScheduler<S, L, N, C> {
    store: Arc<S>,
    launcher: L,
    notifier: N,
    clock: C,
    config: SchedulerConfig,
    flight: Arc<tokio::sync::Mutex<()>>,
    executions: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<S, L: Clone, N: Clone, C: Clone> Clone for AutomationScheduler<S, L, N, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            launcher: self.launcher.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            flight: Arc::clone(&self.flight),
            executions: Arc::clone(&self.executions),
        }
    }
}

impl<S, L, N, C> AutomationScheduler<S, L, N, C>
where
    S: Store,
    L: RunLauncher,
    N: NotifyAdapter,
    C: Clock,
{
    pub fn new(store: Arc<S>, launcher: L, notifier: N, clock: C, config: SchedulerConfig) -> Self {
        Self {
            store,
            launcher,
            notifier,
            clock,
            config,
            flight: Arc::new(tokio::sync::Mutex::new(())),
            executions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Executions whose task has not finished yet.
    pub fn running_executions(&self) -> usize {
        self.executions.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every spawned execution, including ones spawned meanwhile.
    pub async fn wait_for_executions(&self) {
        loop {
            let handles = std::mem::take(&mut *self.executions.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "automation execution task failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../scheduler_tests/mod.rs"]
mod tests;
