// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-then-publish path for run events.
//!
//! Every writer (orchestrator, manager, substrate) goes through the journal
//! so that an event is durable in the store before any subscriber sees it,
//! and so that publication order per run matches sequence order.

use crate::broker::EventBroker;
use crate::error::RunError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tl_core::{Clock, RunEvent, RunId};
use tl_storage::Store;

/// Serializes appends per run and forwards stored events to the broker.
pub struct RunJournal<S, C> {
    store: Arc<S>,
    broker: EventBroker,
    clock: C,
    locks: Arc<Mutex<HashMap<RunId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl<S, C: Clone> Clone for RunJournal<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            broker: self.broker.clone(),
            clock: self.clock.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S, C> RunJournal<S, C>
where
    S: Store,
    C: Clock,
{
    pub fn new(store: Arc<S>, broker: EventBroker, clock: C) -> Self {
        Self { store, broker, clock, locks: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn broker(&self) -> &EventBroker {
        &self.broker
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Persist `event` (stamping the clock if it has no timestamp), then
    /// publish the stored copy.
    pub async fn append(&self, mut event: RunEvent) -> Result<RunEvent, RunError> {
        let lock = self.lock_for(&event.run_id);
        let _guard = lock.lock().await;

        if event.timestamp.is_none() {
            event.timestamp = Some(self.clock.now());
        }
        let stored = self.store.append_event(event).await?;
        tracing::debug!(run_id = %stored.run_id, event = %stored.log_summary(), "event appended");
        self.broker.publish(&stored);
        Ok(stored)
    }

    /// Append a terminal `event` unless the run already finished.
    ///
    /// The check and the append happen under the run's lock, so two writers
    /// racing to end the same run store exactly one terminal event.
    pub async fn append_if_running(&self, mut event: RunEvent) -> Result<Option<RunEvent>, RunError> {
        let lock = self.lock_for(&event.run_id);
        let _guard = lock.lock().await;

        let run = self.store.get_run(&event.run_id).await?;
        if run.as_ref().is_some_and(|run| run.is_terminal()) {
            tracing::debug!(run_id = %event.run_id, event = %event.kind(), "run already finished, event skipped");
            return Ok(None);
        }
        if event.timestamp.is_none() {
            event.timestamp = Some(self.clock.now());
        }
        let stored = self.store.append_event(event).await?;
        tracing::debug!(run_id = %stored.run_id, event = %stored.log_summary(), "event appended");
        self.broker.publish(&stored);
        Ok(Some(stored))
    }

    /// Drop the per-run append lock once a run's writers are done.
    pub fn release(&self, run_id: &RunId) {
        self.locks.lock().remove(run_id);
    }

    fn lock_for(&self, run_id: &RunId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(run_id.clone()).or_default())
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
