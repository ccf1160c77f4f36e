// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tl-engine: Run control loops, event fan-out, and automation scheduling

pub mod broker;
mod error;
pub mod journal;
pub mod launcher;
pub mod manager;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;

pub use broker::{EventBroker, Subscription, DEFAULT_SUBSCRIBER_CAPACITY};
pub use error::{RunError, SchedulerError};
pub use journal::RunJournal;
pub use launcher::{RunLauncher, RunOutcome, StartRun};
pub use manager::{RunConfig, RunManager, DEFAULT_RUN_DEADLINE};
pub use orchestrator::{RunOrchestrator, Signal, SignalInbox};
pub use retry::RetryPolicy;
pub use scheduler::{
    AutomationScheduler, QueueOutcome, ReconcileReport, SchedulerConfig, DEFAULT_EXECUTION_LEASE,
    DEFAULT_POLL_INTERVAL, INTERRUPTED_ERROR, LEASE_EXPIRED_ERROR,
};
