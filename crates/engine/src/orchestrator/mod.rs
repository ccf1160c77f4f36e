// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run control loop.
//!
//! A run alternates between waiting for input and driving one
//! plan → execute → verify cycle per message. Signals are only looked at
//! between activities: a cancel ends the run at the next boundary, and a
//! new message abandons the rest of the current cycle and starts over with
//! that message. The loop never writes run state directly; every
//! transition is an event appended through the [`RunJournal`].

mod cycle;
mod signals;

pub use signals::{Signal, SignalInbox};

use crate::error::RunError;
use crate::journal::RunJournal;
use crate::retry::RetryPolicy;
use serde_json::json;
use tl_adapters::{ActivityAdapter, VerifyOutput};
use tl_core::{sources, Clock, CompletionReason, EventKind, RunEvent, RunId, RunPhase, RunResult, RunStatus};
use tl_storage::Store;

/// Step kind used for the umbrella step of each cycle.
pub const CYCLE_STEP_KIND: &str = "cycle";

/// How one cycle ended.
#[derive(Debug)]
enum CycleOutcome {
    /// Verification returned a verdict.
    Verified(VerifyOutput),
    /// A newer message arrived between activities.
    Superseded,
    Cancelled,
    /// An activity failed for good; carries the formatted error.
    Failed(String),
}

/// Drives one run from its first message to a terminal event.
pub struct RunOrchestrator<S, A, C> {
    run_id: RunId,
    journal: RunJournal<S, C>,
    adapter: A,
    retry: RetryPolicy,
    phase: RunPhase,
    cycle: u32,
}

impl<S, A, C> RunOrchestrator<S, A, C>
where
    S: Store,
    A: ActivityAdapter,
    C: Clock,
{
    pub fn new(run_id: RunId, journal: RunJournal<S, C>, adapter: A, retry: RetryPolicy) -> Self {
        Self { run_id, journal, adapter, retry, phase: RunPhase::Planning, cycle: 0 }
    }

    /// Run until a terminal event has been appended.
    ///
    /// Returns `Err` only when the journal itself fails; activity failures
    /// become a `run.failed` event and an `Ok` failed result.
    pub async fn run(mut self, mut inbox: SignalInbox) -> Result<RunResult, RunError> {
        self.load_position().await?;
        tracing::info!(run_id = %self.run_id, cycle = self.cycle, "control loop started");

        let mut verdict: Option<VerifyOutput> = None;
        loop {
            if inbox.cancel_requested() {
                return self.finish_cancelled().await;
            }

            let Some(message) = inbox.next_message() else {
                if let Some(verdict) = verdict.take() {
                    return self.finish_verified(verdict).await;
                }
                if !inbox.wait().await {
                    tracing::warn!(run_id = %self.run_id, "signal channel closed while idle");
                    return self.finish_cancelled().await;
                }
                continue;
            };

            verdict = None;
            match self.run_cycle(&message, &mut inbox).await? {
                CycleOutcome::Verified(v) => verdict = Some(v),
                CycleOutcome::Superseded => {
                    tracing::info!(run_id = %self.run_id, cycle = self.cycle, "cycle superseded by new message");
                }
                CycleOutcome::Cancelled => return self.finish_cancelled().await,
                CycleOutcome::Failed(error) => return self.finish_failed(&error, &mut inbox).await,
            }
        }
    }

    /// Pick up phase and cycle count from the projection so a resumed run
    /// continues numbering where it stopped.
    async fn load_position(&mut self) -> Result<(), RunError> {
        let store = self.journal.store();
        let run = store.get_run(&self.run_id).await?.ok_or_else(|| RunError::NotFound(self.run_id.clone()))?;
        self.phase = run.phase;
        let steps = store.list_steps(&self.run_id).await?;
        self.cycle = steps.iter().filter(|s| s.kind == CYCLE_STEP_KIND).count() as u32;
        Ok(())
    }

    async fn emit(&self, kind: EventKind, payload: serde_json::Value) -> Result<RunEvent, RunError> {
        let event = RunEvent::new(self.run_id.clone(), kind, sources::ORCHESTRATOR).with_payload(payload);
        self.journal.append(event).await
    }

    async fn emit_raw(&self, event_type: &str, payload: serde_json::Value) -> Result<RunEvent, RunError> {
        let event = RunEvent::raw(self.run_id.clone(), event_type, sources::ORCHESTRATOR).with_payload(payload);
        self.journal.append(event).await
    }

    async fn set_phase(&mut self, phase: RunPhase) -> Result<(), RunError> {
        if self.phase == phase {
            return Ok(());
        }
        self.emit(EventKind::RunPhaseChanged, json!({ "phase": phase.as_str() })).await?;
        tracing::debug!(run_id = %self.run_id, from = %self.phase, to = %phase, "phase changed");
        self.phase = phase;
        Ok(())
    }

    async fn finish_cancelled(&self) -> Result<RunResult, RunError> {
        let result = RunResult::cancelled();
        self.emit(EventKind::RunCancelled, json!({ "completion_reason": result.completion_reason.as_str() }))
            .await?;
        tracing::info!(run_id = %self.run_id, "run cancelled");
        Ok(result)
    }

    async fn finish_failed(&self, error: &str, inbox: &mut SignalInbox) -> Result<RunResult, RunError> {
        if inbox.cancel_requested() {
            return self.finish_cancelled().await;
        }

        self.handle_failure(error).await?;

        let result = RunResult::failed(CompletionReason::ActivityError);
        self.emit(
            EventKind::RunFailed,
            json!({ "completion_reason": result.completion_reason.as_str(), "error": error }),
        )
        .await?;
        if inbox.pending_len() > 0 {
            tracing::warn!(run_id = %self.run_id, dropped = inbox.pending_len(), "messages dropped by failed run");
        }
        tracing::info!(run_id = %self.run_id, error, "run failed");
        Ok(result)
    }

    async fn finish_verified(&self, verdict: VerifyOutput) -> Result<RunResult, RunError> {
        let status = match RunStatus::parse(&verdict.status) {
            Some(status @ (RunStatus::Completed | RunStatus::Partial | RunStatus::Failed)) => status,
            _ => {
                tracing::warn!(
                    run_id = %self.run_id,
                    status = %verdict.status,
                    "unrecognized verification status, treating as failed"
                );
                RunStatus::Failed
            }
        };
        let reason = if verdict.completion_reason.trim().is_empty() {
            default_reason(status)
        } else {
            CompletionReason::parse(&verdict.completion_reason)
        };
        let kind = match status {
            RunStatus::Completed => EventKind::RunCompleted,
            RunStatus::Partial => EventKind::RunPartial,
            _ => EventKind::RunFailed,
        };

        self.emit(kind, json!({ "completion_reason": reason.as_str(), "diagnostics": verdict.diagnostics }))
            .await?;
        tracing::info!(run_id = %self.run_id, %status, reason = %reason, "run finished");
        Ok(RunResult::new(status, reason))
    }
}

fn default_reason(status: RunStatus) -> CompletionReason {
    match status {
        RunStatus::Completed => CompletionReason::Verified,
        RunStatus::Partial => CompletionReason::PartiallyVerified,
        _ => CompletionReason::VerificationFailed,
    }
}

#[cfg(test)]
#[path = "../orchestrator_tests/mod.rs"]
mod tests;
