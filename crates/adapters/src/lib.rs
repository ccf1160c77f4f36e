// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tl-adapters: Activity and notification adapters for taskloop

pub mod activity;
pub mod notify;
pub mod subprocess;

pub use activity::{
    ActivityAdapter, ActivityError, ExecutionOutput, PlanOutput, ScriptActivityAdapter, ScriptHooks,
    VerifyOutput,
};
pub use notify::{DesktopNotifyAdapter, LogNotifyAdapter, NotifyAdapter, NotifyError};

#[cfg(any(test, feature = "test-support"))]
pub use activity::{ActivityCall, ActivityKind, FakeActivityAdapter, Gate};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
