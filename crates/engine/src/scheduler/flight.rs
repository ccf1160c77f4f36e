// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight acquisition.

use super::{AutomationScheduler, QueueOutcome};
use crate::error::SchedulerError;
use crate::launcher::RunLauncher;
use tl_adapters::NotifyAdapter;
use tl_core::{AutomationId, AutomationInboxEntry, Clock, InboxEntryId, Trigger};
use tl_storage::Store;

impl<S, L, N, C> AutomationScheduler<S, L, N, C>
where
    S: Store,
    L: RunLauncher,
    N: NotifyAdapter,
    C: Clock,
{
    /// Acquire the automation and spawn one execution for it.
    ///
    /// Not queuing (already running, disabled) is a normal outcome, not an
    /// error. On success the inbox entry already exists in `running` state.
    pub async fn queue_automation_execution(
        &self,
        id: &AutomationId,
        trigger: Trigger,
    ) -> Result<QueueOutcome, SchedulerError> {
        let (automation, entry) = {
            let _flight = self.flight.lock().await;

            let mut automation =
                self.store.get_automation(id).await?.ok_or_else(|| SchedulerError::NotFound(id.clone()))?;
            if automation.in_progress {
                tracing::debug!(automation_id = %id, %trigger, "execution already in progress");
                return Ok(QueueOutcome::rejected("already in progress"));
            }
            if !automation.enabled {
                tracing::debug!(automation_id = %id, %trigger, "automation disabled");
                return Ok(QueueOutcome::rejected("disabled"));
            }

            let now = self.clock.now();
            automation.begin_execution(now);
            self.store.upsert_automation(automation.clone()).await?;

            let entry = AutomationInboxEntry::running(&automation, trigger, now);
            if let Err(e) = self.store.create_inbox_entry(entry.clone()).await {
                automation.end_execution(now);
                if let Err(rollback) = self.store.upsert_automation(automation).await {
                    tracing::error!(
                        automation_id = %id,
                        error = %rollback,
                        "failed to roll back in-progress flag"
                    );
                }
                return Err(e.into());
            }
            (automation, entry)
        };

        tracing::info!(
            automation_id = %automation.id,
            name = %automation.name,
            entry_id = %entry.id,
            %trigger,
            "automation execution queued"
        );
        let entry_id = entry.id.clone();
        self.spawn_execution(automation, entry);
        Ok(QueueOutcome::queued(entry_id))
    }

    /// Manually queue an execution; refusal is an error here.
    pub async fn trigger_now(&self, id: &AutomationId) -> Result<InboxEntryId, SchedulerError> {
        let outcome = self.queue_automation_execution(id, Trigger::Manual).await?;
        match outcome.inbox_entry_id {
            Some(entry_id) if outcome.queued => Ok(entry_id),
            _ => Err(SchedulerError::Conflict { reason: outcome.reason.unwrap_or_else(|| "not queued".to_string()) }),
        }
    }
}
