// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! taskloop daemon library
//!
//! Wires the engine to its concrete adapters, persistence, and process
//! lifecycle. The `tld` binary is a thin wrapper around this crate.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod logging;
mod notify;

pub use config::{EnvOverrides, FileConfig, NotifyMode, Settings};
pub use lifecycle::{reconcile_state, startup, Config, DaemonState, LifecycleError, ReconcileSummary};
pub use notify::DaemonNotifier;
