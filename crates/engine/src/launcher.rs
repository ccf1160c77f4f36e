// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam between the automation scheduler and whatever starts runs.

use crate::error::RunError;
use async_trait::async_trait;
use tl_core::{AutomationId, CompletionReason, RunId, RunPhase, RunStatus};

/// Request to start a new run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRun {
    pub prompt: String,
    pub automation_id: Option<AutomationId>,
}

impl StartRun {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), automation_id: None }
    }

    pub fn for_automation(prompt: impl Into<String>, automation_id: AutomationId) -> Self {
        Self { prompt: prompt.into(), automation_id: Some(automation_id) }
    }
}

/// Final view of a run as reported back to its launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    pub phase: RunPhase,
    pub completion_reason: CompletionReason,
    pub diagnostics: Vec<String>,
}

/// Starts runs and waits for their outcome.
#[async_trait]
pub trait RunLauncher: Clone + Send + Sync + 'static {
    async fn launch(&self, request: StartRun) -> Result<RunId, RunError>;

    /// Block until `run_id` is terminal.
    async fn wait_outcome(&self, run_id: &RunId) -> Result<RunOutcome, RunError>;
}
