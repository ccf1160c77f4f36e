// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Automation CRUD and inbox reads.

use super::AutomationScheduler;
use crate::error::SchedulerError;
use crate::launcher::RunLauncher;
use tl_adapters::NotifyAdapter;
use tl_core::{Automation, AutomationId, AutomationInboxEntry, AutomationSpec, Clock, InboxEntryId};
use tl_storage::{InboxFilter, Store};

impl<S, L, N, C> AutomationScheduler<S, L, N, C>
where
    S: Store,
    L: RunLauncher,
    N: NotifyAdapter,
    C: Clock,
{
    pub async fn create_automation(&self, spec: &AutomationSpec) -> Result<Automation, SchedulerError> {
        let automation = Automation::from_spec(spec, self.clock.now())?;
        self.store.upsert_automation(automation.clone()).await?;
        tracing::info!(
            automation_id = %automation.id,
            name = %automation.name,
            next_run_at = ?automation.next_run_at,
            "automation created"
        );
        Ok(automation)
    }

    /// Replace the user-editable fields. Execution state is preserved.
    pub async fn update_automation(
        &self,
        id: &AutomationId,
        spec: &AutomationSpec,
    ) -> Result<Automation, SchedulerError> {
        let _flight = self.flight.lock().await;
        let mut automation = self.load_automation(id).await?;
        automation.apply_spec(spec, self.clock.now())?;
        self.store.upsert_automation(automation.clone()).await?;
        tracing::info!(automation_id = %id, "automation updated");
        Ok(automation)
    }

    /// Create the automation named in `spec`, or update the one that
    /// already carries that name.
    pub async fn sync_automation(&self, spec: &AutomationSpec) -> Result<Automation, SchedulerError> {
        let existing = self.store.list_automations().await?.into_iter().find(|a| a.name == spec.name);
        match existing {
            Some(automation) => self.update_automation(&automation.id, spec).await,
            None => self.create_automation(spec).await,
        }
    }

    pub async fn set_enabled(&self, id: &AutomationId, enabled: bool) -> Result<Automation, SchedulerError> {
        let _flight = self.flight.lock().await;
        let mut automation = self.load_automation(id).await?;
        let now = self.clock.now();
        automation.enabled = enabled;
        automation.updated_at = now;
        automation.refresh_next_run(now)?;
        self.store.upsert_automation(automation.clone()).await?;
        tracing::info!(automation_id = %id, enabled, "automation toggled");
        Ok(automation)
    }

    /// Returns whether the automation existed. Its inbox is kept.
    pub async fn delete_automation(&self, id: &AutomationId) -> Result<bool, SchedulerError> {
        let _flight = self.flight.lock().await;
        let deleted = self.store.delete_automation(id).await?;
        if deleted {
            tracing::info!(automation_id = %id, "automation deleted");
        }
        Ok(deleted)
    }

    pub async fn get_automation(&self, id: &AutomationId) -> Result<Automation, SchedulerError> {
        self.load_automation(id).await
    }

    pub async fn list_automations(&self) -> Result<Vec<Automation>, SchedulerError> {
        Ok(self.store.list_automations().await?)
    }

    pub async fn list_inbox(&self, filter: &InboxFilter) -> Result<Vec<AutomationInboxEntry>, SchedulerError> {
        Ok(self.store.list_inbox(filter).await?)
    }

    pub async fn mark_inbox_read(&self, id: &InboxEntryId, read: bool) -> Result<(), SchedulerError> {
        Ok(self.store.mark_inbox_read(id, read).await?)
    }

    pub async fn unread_count(&self, automation_id: Option<&AutomationId>) -> Result<usize, SchedulerError> {
        let filter =
            InboxFilter { automation_id: automation_id.cloned(), unread_only: true, ..InboxFilter::default() };
        Ok(self.store.list_inbox(&filter).await?.len())
    }

    async fn load_automation(&self, id: &AutomationId) -> Result<Automation, SchedulerError> {
        self.store.get_automation(id).await?.ok_or_else(|| SchedulerError::NotFound(id.clone()))
    }
}
