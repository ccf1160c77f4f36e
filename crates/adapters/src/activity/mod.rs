// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activities invoked by the run orchestrator.
//!
//! An activity is one out-of-line unit of work (plan, execute, verify,
//! failure handling). Adapters report failures as [`ActivityError`], which
//! separates errors worth retrying from ones that end the run.

mod script;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tl_core::RunId;

pub use script::{ScriptActivityAdapter, ScriptHooks};

/// Errors from activity calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    /// Worth retrying (timeouts, temporary unavailability)
    #[error("{0}")]
    Transient(String),
    /// Validation or logic failure; retrying will not help
    #[error("{0}")]
    Terminal(String),
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ActivityError::Transient(m) | ActivityError::Terminal(m) => m,
        }
    }
}

/// Result of `PlanExecution`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutput {
    pub plan_id: String,
}

/// Result of `ExecutePlan`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub plan_id: String,
    #[serde(default)]
    pub result: String,
}

/// Result of `VerifyExecution`.
///
/// `status` is free-form here; the orchestrator coerces anything other than
/// completed/partial/failed to failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutput {
    pub status: String,
    #[serde(default)]
    pub completion_reason: String,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl VerifyOutput {
    pub fn new(status: impl Into<String>, completion_reason: impl Into<String>) -> Self {
        Self { status: status.into(), completion_reason: completion_reason.into(), diagnostics: Vec::new() }
    }
}

/// The activity set a run's control loop drives.
#[async_trait]
pub trait ActivityAdapter: Clone + Send + Sync + 'static {
    async fn plan_execution(&self, run_id: &RunId, message: &str) -> Result<PlanOutput, ActivityError>;

    async fn execute_plan(
        &self,
        run_id: &RunId,
        message: &str,
        plan_id: &str,
    ) -> Result<ExecutionOutput, ActivityError>;

    async fn verify_execution(
        &self,
        run_id: &RunId,
        message: &str,
        plan_id: &str,
    ) -> Result<VerifyOutput, ActivityError>;

    async fn handle_run_failure(&self, run_id: &RunId, error: &str) -> Result<(), ActivityError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ActivityCall, ActivityKind, FakeActivityAdapter, Gate};
