// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tl_core::{AutomationId, CompletionReason, EventKind, Run, RunEvent, RunPhase, RunStatus};

pub(super) fn apply(run: &mut Run, kind: EventKind, event: &RunEvent) {
    match kind {
        EventKind::RunStarted => {
            run.status = RunStatus::Running;
            run.phase = RunPhase::Planning;
            run.completion_reason = None;
            if let Some(prompt) = event.payload_nonempty("prompt") {
                run.prompt = prompt.to_string();
            }
            if let Some(id) = event.payload_nonempty("automation_id") {
                run.automation_id = Some(AutomationId::from_string(id));
            }
        }
        EventKind::RunPhaseChanged => {
            // Unrecognized phases are ignored rather than rejected
            if let Some(phase) = event.payload_str("phase").and_then(RunPhase::parse) {
                run.phase = phase;
            }
        }
        EventKind::RunCompleted => finish(run, RunStatus::Completed, event),
        EventKind::RunPartial => finish(run, RunStatus::Partial, event),
        EventKind::RunFailed => finish(run, RunStatus::Failed, event),
        EventKind::RunCancelled => finish(run, RunStatus::Cancelled, event),
        EventKind::RunResumed => {
            run.status = RunStatus::Running;
            run.phase = RunPhase::Planning;
            run.completion_reason = None;
            run.resumed_from = event.payload_u64("resumed_from");
        }
        _ => {}
    }
}

fn finish(run: &mut Run, status: RunStatus, event: &RunEvent) {
    run.status = status;
    run.phase = status.terminal_phase();
    run.completion_reason = event
        .payload_nonempty("completion_reason")
        .map(CompletionReason::parse)
        .or_else(|| CompletionReason::fallback_for(status));
}
