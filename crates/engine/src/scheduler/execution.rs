// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running one acquired execution and recording how it ended.

use super::AutomationScheduler;
use crate::launcher::{RunLauncher, RunOutcome, StartRun};
use chrono::{DateTime, Utc};
use tl_adapters::NotifyAdapter;
use tl_core::{Automation, AutomationId, AutomationInboxEntry, Clock, InboxEntryId, InboxResult, RunId};
use tl_storage::Store;

impl<S, L, N, C> AutomationScheduler<S, L, N, C>
where
    S: Store,
    L: RunLauncher,
    N: NotifyAdapter,
    C: Clock,
{
    pub(super) fn spawn_execution(&self, automation: Automation, entry: AutomationInboxEntry) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move { scheduler.execute(automation, entry).await });

        let mut executions = self.executions.lock();
        executions.retain(|h| !h.is_finished());
        executions.push(handle);
    }

    /// Follow a run started by a previous process through to the entry's
    /// outcome, as if this process had launched it.
    pub(super) fn spawn_reattached(&self, entry: AutomationInboxEntry, run_id: RunId) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = scheduler.launcher.wait_outcome(&run_id).await.map_err(|e| e.to_string());
            scheduler.finish(&entry, outcome).await;
        });

        let mut executions = self.executions.lock();
        executions.retain(|h| !h.is_finished());
        executions.push(handle);
    }

    async fn execute(&self, automation: Automation, entry: AutomationInboxEntry) {
        let request = StartRun::for_automation(automation.prompt.clone(), automation.id.clone());
        let outcome = match self.launcher.launch(request).await {
            Ok(run_id) => {
                self.attach_run(&entry.id, &run_id).await;
                self.launcher.wait_outcome(&run_id).await.map_err(|e| e.to_string())
            }
            Err(e) => Err(format!("failed to start run: {e}")),
        };
        self.finish(&entry, outcome).await;
    }

    async fn finish(&self, entry: &AutomationInboxEntry, outcome: Result<RunOutcome, String>) {
        let now = self.clock.now();
        let finished = self.record_outcome(entry, outcome, now).await;
        self.release_flight(&entry.automation_id, &finished, now).await;
        self.notify(&finished).await;
    }

    async fn attach_run(&self, entry_id: &InboxEntryId, run_id: &RunId) {
        match self.store.get_inbox_entry(entry_id).await {
            Ok(Some(mut entry)) => {
                entry.run_id = Some(run_id.clone());
                if let Err(e) = self.store.update_inbox_entry(entry).await {
                    tracing::warn!(entry_id = %entry_id, error = %e, "failed to attach run to inbox entry");
                }
            }
            Ok(None) => tracing::warn!(entry_id = %entry_id, "inbox entry disappeared before run attached"),
            Err(e) => tracing::warn!(entry_id = %entry_id, error = %e, "failed to load inbox entry"),
        }
    }

    /// Write the outcome onto a freshly loaded copy of the entry.
    async fn record_outcome(
        &self,
        entry: &AutomationInboxEntry,
        outcome: Result<RunOutcome, String>,
        now: DateTime<Utc>,
    ) -> AutomationInboxEntry {
        let mut current = match self.store.get_inbox_entry(&entry.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                tracing::warn!(entry_id = %entry.id, "inbox entry disappeared during execution");
                entry.clone()
            }
            Err(e) => {
                tracing::warn!(entry_id = %entry.id, error = %e, "failed to reload inbox entry");
                entry.clone()
            }
        };

        match outcome {
            Ok(outcome) => {
                let status = outcome.status;
                let result = InboxResult {
                    run_id: outcome.run_id,
                    phase: outcome.phase,
                    completion_reason: outcome.completion_reason,
                    diagnostics: outcome.diagnostics,
                };
                current.finish_with_result(status, result, now);
            }
            Err(error) => current.finish_with_error(error, now),
        }

        if let Err(e) = self.store.update_inbox_entry(current.clone()).await {
            tracing::error!(entry_id = %current.id, error = %e, "failed to record execution outcome");
        }
        tracing::info!(
            automation_id = %current.automation_id,
            entry_id = %current.id,
            status = %current.status,
            "automation execution finished"
        );
        current
    }

    /// Clear the in-progress flag (if this execution still owns it) and
    /// schedule the next slot.
    pub(super) async fn release_flight(
        &self,
        automation_id: &AutomationId,
        finished: &AutomationInboxEntry,
        now: DateTime<Utc>,
    ) {
        let _flight = self.flight.lock().await;

        let mut current = match self.store.get_automation(automation_id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                tracing::debug!(automation_id = %automation_id, "automation deleted during execution");
                return;
            }
            Err(e) => {
                tracing::error!(automation_id = %automation_id, error = %e, "failed to reload automation");
                return;
            }
        };

        if current.in_progress && current.in_progress_since == Some(finished.started_at) {
            current.end_execution(now);
        } else if current.in_progress {
            tracing::debug!(automation_id = %current.id, "in-progress flag held by a newer execution");
        }
        current.last_run_at = Some(finished.started_at);
        if let Some(run_id) = &finished.run_id {
            current.last_run_id = Some(run_id.clone());
        }
        current.updated_at = now;
        if let Err(e) = current.refresh_next_run(now) {
            tracing::warn!(automation_id = %current.id, error = %e, "no next run could be scheduled");
            current.next_run_at = None;
        }

        if let Err(e) = self.store.upsert_automation(current).await {
            tracing::error!(automation_id = %automation_id, error = %e, "failed to release automation");
        }
    }

    async fn notify(&self, finished: &AutomationInboxEntry) {
        let title = format!("Automation: {}", finished.automation_name);
        let message = format!("{}: {}", finished.status, finished.summary());
        if let Err(e) = self.notifier.notify(&title, &message).await {
            tracing::warn!(entry_id = %finished.id, error = %e, "automation notification failed");
        }
    }
}
