// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-sourced projection of one run.
//!
//! [`RunProjection::apply_event`] is a pure reducer: it folds one
//! [`RunEvent`] into the run record and its derived steps and processes.
//! Replaying the same log from scratch always yields the same projection.

mod processes;
mod run;
mod steps;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tl_core::{EventKind, Run, RunEvent, RunId, RunProcess, RunStep};

/// Producer bugs detected while folding events
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    #[error("event for {event_run} folded into projection of {run}")]
    WrongRun { run: RunId, event_run: RunId },
    #[error("out-of-order event for {run_id}: seq {seq} is not after {last}")]
    OutOfOrder { run_id: RunId, seq: u64, last: u64 },
}

/// A run plus everything derived from its event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProjection {
    pub run: Run,
    /// Steps keyed by step id, in first-seen order
    #[serde(default)]
    pub steps: IndexMap<String, RunStep>,
    /// Processes keyed by process id, in first-seen order
    #[serde(default)]
    pub processes: IndexMap<String, RunProcess>,
}

impl RunProjection {
    pub fn new(run: Run) -> Self {
        Self { run, steps: IndexMap::new(), processes: IndexMap::new() }
    }

    /// Rebuild from scratch by folding `events` over the run's creation state.
    pub fn replay<'a>(
        mut run: Run,
        events: impl IntoIterator<Item = &'a RunEvent>,
    ) -> Result<Self, DeriveError> {
        run.reset_derived();
        let mut projection = Self::new(run);
        for event in events {
            projection.apply_event(event)?;
        }
        Ok(projection)
    }

    /// Fold one event. Events must arrive in strictly increasing `seq` order.
    ///
    /// Unknown event types only advance `checkpoint_seq` and `updated_at`.
    pub fn apply_event(&mut self, event: &RunEvent) -> Result<(), DeriveError> {
        if event.run_id != self.run.id {
            return Err(DeriveError::WrongRun {
                run: self.run.id.clone(),
                event_run: event.run_id.clone(),
            });
        }
        if event.seq <= self.run.checkpoint_seq {
            return Err(DeriveError::OutOfOrder {
                run_id: self.run.id.clone(),
                seq: event.seq,
                last: self.run.checkpoint_seq,
            });
        }

        let kind = event.kind();
        match kind {
            EventKind::RunStarted
            | EventKind::RunPhaseChanged
            | EventKind::RunCompleted
            | EventKind::RunPartial
            | EventKind::RunFailed
            | EventKind::RunCancelled
            | EventKind::RunResumed => run::apply(&mut self.run, kind, event),
            EventKind::StepStarted
            | EventKind::StepCompleted
            | EventKind::StepFailed
            | EventKind::StepRetrying
            | EventKind::StepOther => steps::apply(&mut self.steps, kind, event),
            EventKind::ProcessStarted
            | EventKind::ProcessUpdated
            | EventKind::ProcessOutput
            | EventKind::ProcessExited => processes::apply(&mut self.processes, kind, event),
            EventKind::Unknown => {}
        }

        self.run.checkpoint_seq = self.run.checkpoint_seq.max(event.seq);
        if let Some(ts) = event.timestamp {
            self.run.updated_at = ts;
        }
        Ok(())
    }

    pub fn step(&self, step_id: &str) -> Option<&RunStep> {
        self.steps.get(step_id)
    }
}

#[cfg(test)]
#[path = "../projection_tests/mod.rs"]
mod tests;
