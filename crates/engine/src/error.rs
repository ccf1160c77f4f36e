// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use thiserror::Error;
use tl_core::{AutomationId, RunId, ScheduleError};
use tl_storage::StoreError;

/// Errors from run control operations
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run not found: {0}")]
    NotFound(RunId),
    #[error("run {0} is already finished")]
    Terminal(RunId),
    #[error("run {0} has no active control loop")]
    NotActive(RunId),
    #[error("run {0} has no message to resume from")]
    NoMessage(RunId),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from automation scheduling and management
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("automation not found: {0}")]
    NotFound(AutomationId),
    #[error("automation not queued: {reason}")]
    Conflict { reason: String },
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("run error: {0}")]
    Run(#[from] RunError),
}
