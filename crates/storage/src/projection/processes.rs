// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use indexmap::IndexMap;
use tl_core::{EventKind, ProcessStatus, RunEvent, RunProcess};

/// Merge a `process.*` event into its process.
///
/// Descriptive fields only move forward. `status`, `exit_code` and `signal`
/// track the latest observation; a fresh `process.started` clears the exit
/// information of a previous incarnation.
pub(super) fn apply(processes: &mut IndexMap<String, RunProcess>, kind: EventKind, event: &RunEvent) {
    let Some(process_id) = event.payload_nonempty("process_id") else {
        return;
    };
    let process = processes
        .entry(process_id.to_string())
        .or_insert_with(|| RunProcess::new(event.run_id.clone(), process_id));

    if let Some(command) = event.payload_nonempty("command") {
        process.command = Some(command.to_string());
    }
    if let Some(pid) = event.payload_u64("pid").and_then(|p| u32::try_from(p).ok()) {
        process.pid = Some(pid);
    }
    process.preview_urls.extend(event.payload_str_list("preview_urls"));
    process.preview_urls.extend(event.payload_str_list("preview_url"));
    if kind == EventKind::ProcessOutput {
        if let Some(line) = event.payload_nonempty("line").or_else(|| event.payload_nonempty("output")) {
            process.last_output = Some(line.to_string());
        }
    }

    if kind == EventKind::ProcessStarted {
        process.exit_code = None;
        process.signal = None;
        if process.started_at.is_none() {
            process.started_at = event.timestamp;
        }
    }
    let status = event
        .payload_str("status")
        .and_then(ProcessStatus::parse)
        .or_else(|| ProcessStatus::implied_by(kind));
    if let Some(status) = status {
        process.status = status;
    }
    if event.payload.get("exit_code").is_some() {
        process.exit_code = event.payload_i64("exit_code").and_then(|c| i32::try_from(c).ok());
    }
    if let Some(signal) = event.payload_str("signal") {
        let signal = signal.trim();
        process.signal = (!signal.is_empty()).then(|| signal.to_string());
    }

    if event.timestamp.is_some() {
        process.updated_at = event.timestamp;
    }
    process.last_seq = event.seq;
}
