// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Due detection and the poll loop.

use super::AutomationScheduler;
use crate::error::SchedulerError;
use crate::launcher::RunLauncher;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tl_adapters::NotifyAdapter;
use tl_core::{Clock, Trigger};
use tl_storage::Store;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Lower bound on the poll period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl<S, L, N, C> AutomationScheduler<S, L, N, C>
where
    S: Store,
    L: RunLauncher,
    N: NotifyAdapter,
    C: Clock,
{
    /// Queue every enabled, idle automation whose slot has come.
    ///
    /// `next_run_at` is recomputed from one second before now, so a slot
    /// that falls exactly on this instant still counts. A slot recorded
    /// earlier and already passed (e.g. while the process was down) is due
    /// as well. Slots at or before the last execution start never are.
    /// Returns how many executions were queued.
    pub async fn queue_due_automations(&self, trigger: Trigger) -> Result<usize, SchedulerError> {
        let now = self.clock.now();
        let reference = now - chrono::Duration::seconds(1);

        let mut due = Vec::new();
        {
            let _flight = self.flight.lock().await;
            for mut automation in self.store.list_automations().await? {
                if !automation.enabled || automation.in_progress {
                    continue;
                }
                let previous = automation.next_run_at;
                let last_run_at = automation.last_run_at;
                let after_last_run = |at: DateTime<Utc>| last_run_at.map_or(true, |last| at > last);
                let from = last_run_at.filter(|last| *last > reference).unwrap_or(reference);
                if let Err(e) = automation.refresh_next_run(from) {
                    tracing::warn!(automation_id = %automation.id, error = %e, "cannot schedule automation");
                    continue;
                }
                let is_due = previous.map_or(false, |at| at <= now && after_last_run(at))
                    || automation.next_run_at.map_or(false, |at| at <= now);

                if automation.next_run_at != previous {
                    if let Err(e) = self.store.upsert_automation(automation.clone()).await {
                        tracing::warn!(automation_id = %automation.id, error = %e, "failed to persist next run");
                        continue;
                    }
                }
                if is_due {
                    due.push(automation.id);
                }
            }
        }

        let mut queued = 0;
        for id in due {
            match self.queue_automation_execution(&id, trigger).await {
                Ok(outcome) if outcome.queued => queued += 1,
                Ok(outcome) => {
                    tracing::debug!(automation_id = %id, reason = ?outcome.reason, "due automation not queued")
                }
                Err(e) => tracing::warn!(automation_id = %id, error = %e, "failed to queue due automation"),
            }
        }
        if queued > 0 {
            tracing::info!(queued, "queued due automations");
        }
        Ok(queued)
    }

    /// One poll: reclaim stale leases, then queue what is due.
    pub async fn poll_once(&self) -> usize {
        if let Err(e) = self.reconcile_stale().await {
            tracing::warn!(error = %e, "stale execution reconciliation failed");
        }
        match self.queue_due_automations(Trigger::Scheduled).await {
            Ok(queued) => queued,
            Err(e) => {
                tracing::warn!(error = %e, "due automation scan failed");
                0
            }
        }
    }

    /// Poll on a fixed interval until `token` is cancelled.
    pub async fn run_poll_loop(&self, token: CancellationToken) {
        let period = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = period.as_millis() as u64, "automation poll loop started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
        tracing::info!("automation poll loop stopped");
    }
}
