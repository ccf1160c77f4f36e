// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tl-core: Core types for the taskloop run orchestration engine

pub mod macros;

pub mod automation;
pub mod clock;
pub mod event;
pub mod id;
pub mod process;
pub mod records;
pub mod run;
pub mod schedule;
pub mod step;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use automation::{
    Automation, AutomationId, AutomationInboxEntry, AutomationSpec, InboxEntryId, InboxResult,
    InboxStatus, Trigger,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{sources, EventKind, RunEvent};
pub use process::{ProcessStatus, RunProcess};
pub use records::{Artifact, ArtifactId, MessageId, MessageRole, RunMessage};
pub use run::{CompletionReason, Run, RunId, RunPhase, RunResult, RunStatus};
pub use schedule::{normalize_days, Schedule, ScheduleError, TimeOfDay, Weekday};
pub use step::{RunStep, StepStatus};
