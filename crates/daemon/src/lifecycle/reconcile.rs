// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State reconciliation after daemon restart.
//!
//! Runs left `running` by the previous process get their control loop
//! back. Automation executions the previous process never finished are
//! re-attached to their resumed run, or failed and released when no run
//! was ever started for them.

use tl_core::{AutomationId, InboxEntryId, RunId};
use tracing::{info, warn};

use super::DaemonState;

/// What reconciliation touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub resumed_runs: Vec<RunId>,
    pub cleared_automations: Vec<AutomationId>,
    pub reattached_entries: Vec<InboxEntryId>,
    pub interrupted_entries: Vec<InboxEntryId>,
}

/// Reconcile restored state with the (empty) set of live loops.
///
/// Failures are logged; the daemon keeps serving either way.
pub async fn reconcile_state(daemon: &DaemonState) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    match daemon.manager.recover().await {
        Ok(resumed) => summary.resumed_runs = resumed,
        Err(e) => warn!(error = %e, "run recovery failed"),
    }

    // Runs must be resumed first so re-attached executions find a live loop.
    match daemon.scheduler.reclaim_after_restart().await {
        Ok(report) => {
            summary.cleared_automations = report.cleared;
            summary.reattached_entries = report.reattached;
            summary.interrupted_entries = report.expired_entries;
        }
        Err(e) => warn!(error = %e, "automation execution reclaim failed"),
    }

    info!(
        resumed_runs = summary.resumed_runs.len(),
        cleared_automations = summary.cleared_automations.len(),
        reattached_entries = summary.reattached_entries.len(),
        interrupted_entries = summary.interrupted_entries.len(),
        "reconciliation complete"
    );
    summary
}
