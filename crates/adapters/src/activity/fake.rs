// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable activity adapter for tests.

use super::{ActivityAdapter, ActivityError, ExecutionOutput, PlanOutput, VerifyOutput};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tl_core::RunId;
use tokio::sync::{Notify, Semaphore};

/// Which activity a call or gate refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Plan,
    Execute,
    Verify,
    HandleFailure,
}

/// Recorded activity call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityCall {
    Plan { run_id: RunId, message: String },
    Execute { run_id: RunId, message: String, plan_id: String },
    Verify { run_id: RunId, message: String, plan_id: String },
    HandleFailure { run_id: RunId, error: String },
}

impl ActivityCall {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityCall::Plan { .. } => ActivityKind::Plan,
            ActivityCall::Execute { .. } => ActivityKind::Execute,
            ActivityCall::Verify { .. } => ActivityKind::Verify,
            ActivityCall::HandleFailure { .. } => ActivityKind::HandleFailure,
        }
    }

    /// Message (or error text) the call carried
    pub fn text(&self) -> &str {
        match self {
            ActivityCall::Plan { message, .. }
            | ActivityCall::Execute { message, .. }
            | ActivityCall::Verify { message, .. } => message,
            ActivityCall::HandleFailure { error, .. } => error,
        }
    }
}

/// Blocks calls of one activity kind until released.
///
/// Every gated call signals `entered` and then consumes one release permit.
#[derive(Clone)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

impl Gate {
    fn new() -> Self {
        Self { entered: Arc::new(Notify::new()), release: Arc::new(Semaphore::new(0)) }
    }

    /// Wait until a gated call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let `n` gated calls proceed.
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Default)]
struct FakeActivityState {
    calls: Vec<ActivityCall>,
    plan_results: VecDeque<Result<PlanOutput, ActivityError>>,
    execute_results: VecDeque<Result<ExecutionOutput, ActivityError>>,
    verify_results: VecDeque<Result<VerifyOutput, ActivityError>>,
    failure_results: VecDeque<Result<(), ActivityError>>,
    gates: HashMap<ActivityKind, Gate>,
}

/// Fake activity adapter: records calls, returns scripted results.
///
/// With nothing scripted every activity succeeds and verification reports
/// `completed` / `verified`.
#[derive(Clone, Default)]
pub struct FakeActivityAdapter {
    inner: Arc<Mutex<FakeActivityState>>,
}

impl FakeActivityAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_plan_result(&self, result: Result<PlanOutput, ActivityError>) {
        self.inner.lock().plan_results.push_back(result);
    }

    pub fn push_execute_result(&self, result: Result<ExecutionOutput, ActivityError>) {
        self.inner.lock().execute_results.push_back(result);
    }

    pub fn push_verify_result(&self, result: Result<VerifyOutput, ActivityError>) {
        self.inner.lock().verify_results.push_back(result);
    }

    pub fn push_failure_result(&self, result: Result<(), ActivityError>) {
        self.inner.lock().failure_results.push_back(result);
    }

    /// Install (or fetch) the gate for `kind`.
    pub fn gate(&self, kind: ActivityKind) -> Gate {
        self.inner.lock().gates.entry(kind).or_insert_with(Gate::new).clone()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ActivityCall> {
        self.inner.lock().calls.clone()
    }

    pub fn calls_of(&self, kind: ActivityKind) -> Vec<ActivityCall> {
        self.inner.lock().calls.iter().filter(|c| c.kind() == kind).cloned().collect()
    }

    /// Number of calls whose message or error contains `needle`
    pub fn calls_mentioning(&self, needle: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.text().contains(needle)).count()
    }

    async fn enter(&self, call: ActivityCall) {
        let gate = {
            let mut state = self.inner.lock();
            let kind = call.kind();
            state.calls.push(call);
            state.gates.get(&kind).cloned()
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
    }
}

#[async_trait]
impl ActivityAdapter for FakeActivityAdapter {
    async fn plan_execution(&self, run_id: &RunId, message: &str) -> Result<PlanOutput, ActivityError> {
        self.enter(ActivityCall::Plan { run_id: run_id.clone(), message: message.to_string() }).await;
        let mut state = self.inner.lock();
        let n = state.calls.iter().filter(|c| c.kind() == ActivityKind::Plan).count();
        state.plan_results.pop_front().unwrap_or_else(|| Ok(PlanOutput { plan_id: format!("plan-{n}") }))
    }

    async fn execute_plan(
        &self,
        run_id: &RunId,
        message: &str,
        plan_id: &str,
    ) -> Result<ExecutionOutput, ActivityError> {
        self.enter(ActivityCall::Execute {
            run_id: run_id.clone(),
            message: message.to_string(),
            plan_id: plan_id.to_string(),
        })
        .await;
        self.inner.lock().execute_results.pop_front().unwrap_or_else(|| {
            Ok(ExecutionOutput { plan_id: plan_id.to_string(), result: "ok".to_string() })
        })
    }

    async fn verify_execution(
        &self,
        run_id: &RunId,
        message: &str,
        plan_id: &str,
    ) -> Result<VerifyOutput, ActivityError> {
        self.enter(ActivityCall::Verify {
            run_id: run_id.clone(),
            message: message.to_string(),
            plan_id: plan_id.to_string(),
        })
        .await;
        self.inner
            .lock()
            .verify_results
            .pop_front()
            .unwrap_or_else(|| Ok(VerifyOutput::new("completed", "verified")))
    }

    async fn handle_run_failure(&self, run_id: &RunId, error: &str) -> Result<(), ActivityError> {
        self.enter(ActivityCall::HandleFailure { run_id: run_id.clone(), error: error.to_string() })
            .await;
        self.inner.lock().failure_results.pop_front().unwrap_or(Ok(()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
