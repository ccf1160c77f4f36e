// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tl-storage: Storage contract, in-memory store, and event-sourced projections

mod error;
mod memory;
mod projection;
mod snapshot;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use projection::{DeriveError, RunProjection};
pub use snapshot::{load_snapshot, save_snapshot, Snapshot, CURRENT_SNAPSHOT_VERSION};
pub use store::{InboxFilter, RunFilter, Store};
