// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One plan → execute → verify cycle and its step events.

use super::{CycleOutcome, RunOrchestrator, SignalInbox, CYCLE_STEP_KIND};
use crate::error::RunError;
use serde_json::{json, Value};
use std::future::Future;
use tl_adapters::{ActivityAdapter, ActivityError};
use tl_core::{Clock, EventKind, RunPhase};
use tl_storage::Store;

/// Identity of the step that records one activity call.
struct ActivityStep {
    id: String,
    parent: String,
    kind: &'static str,
    dependencies: Vec<String>,
}

impl ActivityStep {
    fn new(cycle_id: &str, kind: &'static str, dependencies: Vec<String>) -> Self {
        Self { id: format!("{cycle_id}/{kind}"), parent: cycle_id.to_string(), kind, dependencies }
    }
}

impl<S, A, C> RunOrchestrator<S, A, C>
where
    S: Store,
    A: ActivityAdapter,
    C: Clock,
{
    pub(super) async fn run_cycle(
        &mut self,
        message: &str,
        inbox: &mut SignalInbox,
    ) -> Result<CycleOutcome, RunError> {
        self.cycle += 1;
        let cycle_id = format!("c{}", self.cycle);
        tracing::info!(run_id = %self.run_id, cycle = %cycle_id, "cycle started");

        self.set_phase(RunPhase::Planning).await?;
        self.emit(
            EventKind::StepStarted,
            json!({
                "step_id": cycle_id,
                "kind": CYCLE_STEP_KIND,
                "name": format!("cycle {}", self.cycle),
                "status": "running",
                "attempt": 1,
            }),
        )
        .await?;

        let plan_step = ActivityStep::new(&cycle_id, "plan", Vec::new());
        let plan = match self.call_activity(&plan_step, || self.adapter.plan_execution(&self.run_id, message)).await? {
            Ok(plan) => plan,
            Err(e) => return self.cycle_failed(&cycle_id, format!("planning: {e}")).await,
        };
        if let Some(outcome) = self.boundary(&cycle_id, inbox).await? {
            return Ok(outcome);
        }

        self.set_phase(RunPhase::Executing).await?;
        let execute_step = ActivityStep::new(&cycle_id, "execute", vec![plan_step.id.clone()]);
        let plan_id = plan.plan_id.as_str();
        let execution = match self
            .call_activity(&execute_step, || self.adapter.execute_plan(&self.run_id, message, plan_id))
            .await?
        {
            Ok(execution) => execution,
            Err(e) => return self.cycle_failed(&cycle_id, format!("execution: {e}")).await,
        };
        tracing::debug!(run_id = %self.run_id, plan_id, result = %execution.result, "execution finished");
        if let Some(outcome) = self.boundary(&cycle_id, inbox).await? {
            return Ok(outcome);
        }

        self.set_phase(RunPhase::Verifying).await?;
        let verify_step = ActivityStep::new(&cycle_id, "verify", vec![execute_step.id.clone()]);
        let verdict = match self
            .call_activity(&verify_step, || self.adapter.verify_execution(&self.run_id, message, plan_id))
            .await?
        {
            Ok(verdict) => verdict,
            Err(e) => return self.cycle_failed(&cycle_id, format!("verification: {e}")).await,
        };
        if !verdict.diagnostics.is_empty() {
            self.emit_raw(
                "step.diagnostics",
                json!({ "step_id": verify_step.id, "diagnostics": verdict.diagnostics }),
            )
            .await?;
        }

        self.emit(EventKind::StepCompleted, json!({ "step_id": cycle_id, "status": "completed" })).await?;
        Ok(CycleOutcome::Verified(verdict))
    }

    /// Invoke the failure hook for `error`, retrying transient failures.
    ///
    /// A hook that still fails is logged; the run fails either way.
    pub(super) async fn handle_failure(&self, error: &str) -> Result<(), RunError> {
        let cycle_id = format!("c{}", self.cycle.max(1));
        let step = ActivityStep::new(&cycle_id, "handle_failure", Vec::new());
        if let Err(e) = self.call_activity(&step, || self.adapter.handle_run_failure(&self.run_id, error)).await? {
            tracing::error!(run_id = %self.run_id, error = %e, "failure handler failed");
        }
        Ok(())
    }

    /// Signal check between activities.
    async fn boundary(&self, cycle_id: &str, inbox: &mut SignalInbox) -> Result<Option<CycleOutcome>, RunError> {
        if inbox.cancel_requested() {
            self.emit_raw("step.cancelled", json!({ "step_id": cycle_id, "status": "cancelled" })).await?;
            return Ok(Some(CycleOutcome::Cancelled));
        }
        if inbox.has_message() {
            self.emit_raw(
                "step.superseded",
                json!({ "step_id": cycle_id, "status": "cancelled", "policy_decision": "superseded" }),
            )
            .await?;
            return Ok(Some(CycleOutcome::Superseded));
        }
        Ok(None)
    }

    async fn cycle_failed(&self, cycle_id: &str, error: String) -> Result<CycleOutcome, RunError> {
        self.emit(EventKind::StepFailed, json!({ "step_id": cycle_id, "status": "failed", "error": error }))
            .await?;
        Ok(CycleOutcome::Failed(error))
    }

    /// Run one activity under the retry policy, recording each attempt as
    /// step events.
    ///
    /// The outer `Result` is the journal; the inner one is the activity.
    async fn call_activity<T, F, Fut>(&self, step: &ActivityStep, call: F) -> Result<Result<T, ActivityError>, RunError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let mut attempt: u32 = 1;
        self.emit(
            EventKind::StepStarted,
            json!({
                "step_id": step.id,
                "parent_step_id": step.parent,
                "kind": step.kind,
                "name": step.kind,
                "dependencies": step.dependencies,
                "status": "running",
                "attempt": attempt,
            }),
        )
        .await?;

        loop {
            match call().await {
                Ok(value) => {
                    self.emit(
                        EventKind::StepCompleted,
                        json!({ "step_id": step.id, "status": "completed", "attempt": attempt, "error": "" }),
                    )
                    .await?;
                    return Ok(Ok(value));
                }
                Err(e) if e.is_retryable() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        run_id = %self.run_id,
                        step = %step.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "activity failed, retrying"
                    );
                    self.emit(EventKind::StepRetrying, attempt_payload(step, attempt, &e, "retry")).await?;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                    self.emit(
                        EventKind::StepStarted,
                        json!({ "step_id": step.id, "status": "running", "attempt": attempt }),
                    )
                    .await?;
                }
                Err(e) => {
                    tracing::warn!(run_id = %self.run_id, step = %step.id, attempt, error = %e, "activity failed");
                    self.emit(EventKind::StepFailed, attempt_payload(step, attempt, &e, "fail")).await?;
                    return Ok(Err(e));
                }
            }
        }
    }
}

fn attempt_payload(step: &ActivityStep, attempt: u32, error: &ActivityError, decision: &str) -> Value {
    let status = if decision == "retry" { "retrying" } else { "failed" };
    json!({
        "step_id": step.id,
        "status": status,
        "attempt": attempt,
        "error": error.message(),
        "policy_decision": decision,
    })
}
