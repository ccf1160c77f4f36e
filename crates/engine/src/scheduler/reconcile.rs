// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery of in-progress flags whose execution is gone, either after a
//! restart or once the execution lease runs out.

use super::AutomationScheduler;
use crate::error::SchedulerError;
use crate::launcher::RunLauncher;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tl_adapters::NotifyAdapter;
use tl_core::{Automation, AutomationId, Clock, InboxEntryId, InboxStatus};
use tl_storage::{InboxFilter, Store};

/// Error recorded on inbox entries abandoned by reconciliation.
pub const LEASE_EXPIRED_ERROR: &str = "execution lease expired";

/// Error recorded on running inbox entries a restart left without a run.
pub const INTERRUPTED_ERROR: &str = "execution interrupted by restart";

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub cleared: Vec<AutomationId>,
    pub expired_entries: Vec<InboxEntryId>,
    /// Entries now following their run again.
    pub reattached: Vec<InboxEntryId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty() && self.expired_entries.is_empty() && self.reattached.is_empty()
    }
}

impl<S, L, N, C> AutomationScheduler<S, L, N, C>
where
    S: Store,
    L: RunLauncher,
    N: NotifyAdapter,
    C: Clock,
{
    /// Clear in-progress flags held longer than the execution lease and
    /// fail their still-running inbox entries.
    pub async fn reconcile_stale(&self) -> Result<ReconcileReport, SchedulerError> {
        let now = self.clock.now();
        let lease = chrono::Duration::from_std(self.config.execution_lease)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        let mut report = ReconcileReport::default();

        let _flight = self.flight.lock().await;
        for mut automation in self.store.list_automations().await? {
            if !automation.in_progress {
                continue;
            }
            let since = automation.in_progress_since.unwrap_or(automation.updated_at);
            if now.signed_duration_since(since) < lease {
                continue;
            }

            let filter = InboxFilter {
                status: Some(InboxStatus::Running),
                ..InboxFilter::for_automation(automation.id.clone())
            };
            for mut entry in self.store.list_inbox(&filter).await? {
                entry.finish_with_error(LEASE_EXPIRED_ERROR, now);
                self.store.update_inbox_entry(entry.clone()).await?;
                report.expired_entries.push(entry.id);
            }

            self.clear_flag(&mut automation, now).await?;
            tracing::warn!(
                automation_id = %automation.id,
                held_secs = now.signed_duration_since(since).num_seconds(),
                "cleared stale in-progress flag"
            );
            report.cleared.push(automation.id);
        }
        Ok(report)
    }

    /// Take over the executions a previous process left behind.
    ///
    /// Nothing in this process holds a flag yet, so no lease applies. A
    /// running entry with a run is re-attached to that run's outcome; one
    /// without a run is failed. Flags no re-attached entry will release
    /// are cleared. Call once at startup, after interrupted runs resumed.
    pub async fn reclaim_after_restart(&self) -> Result<ReconcileReport, SchedulerError> {
        let now = self.clock.now();
        let mut report = ReconcileReport::default();
        let mut held: HashSet<(AutomationId, DateTime<Utc>)> = HashSet::new();

        let _flight = self.flight.lock().await;
        let running = InboxFilter { status: Some(InboxStatus::Running), ..InboxFilter::default() };
        for mut entry in self.store.list_inbox(&running).await? {
            match entry.run_id.clone() {
                Some(run_id) => {
                    tracing::info!(entry_id = %entry.id, run_id = %run_id, "re-attaching execution");
                    held.insert((entry.automation_id.clone(), entry.started_at));
                    report.reattached.push(entry.id.clone());
                    self.spawn_reattached(entry, run_id);
                }
                None => {
                    entry.finish_with_error(INTERRUPTED_ERROR, now);
                    self.store.update_inbox_entry(entry.clone()).await?;
                    tracing::warn!(entry_id = %entry.id, "execution interrupted before its run started");
                    report.expired_entries.push(entry.id);
                }
            }
        }

        for mut automation in self.store.list_automations().await? {
            if !automation.in_progress {
                continue;
            }
            let owner = automation.in_progress_since.map(|since| (automation.id.clone(), since));
            if owner.is_some_and(|owner| held.contains(&owner)) {
                continue;
            }
            self.clear_flag(&mut automation, now).await?;
            tracing::warn!(automation_id = %automation.id, "cleared in-progress flag left by previous process");
            report.cleared.push(automation.id);
        }
        Ok(report)
    }

    /// Operator escape hatch: drop the in-progress flag unconditionally.
    ///
    /// Returns whether the flag was set.
    pub async fn force_clear_in_progress(&self, id: &AutomationId) -> Result<bool, SchedulerError> {
        let now = self.clock.now();
        let _flight = self.flight.lock().await;
        let mut automation =
            self.store.get_automation(id).await?.ok_or_else(|| SchedulerError::NotFound(id.clone()))?;
        if !automation.in_progress {
            return Ok(false);
        }
        self.clear_flag(&mut automation, now).await?;
        tracing::warn!(automation_id = %id, "in-progress flag force-cleared");
        Ok(true)
    }

    async fn clear_flag(&self, automation: &mut Automation, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        automation.end_execution(now);
        if let Err(e) = automation.refresh_next_run(now) {
            tracing::warn!(automation_id = %automation.id, error = %e, "no next run could be scheduled");
            automation.next_run_at = None;
        }
        self.store.upsert_automation(automation.clone()).await?;
        Ok(())
    }
}
