// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for restart recovery.
//!
//! A snapshot holds the raw event logs and CRUD tables, zstd-compressed
//! JSON. Projections are never persisted: loading a snapshot replays every
//! event log through the deriver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tl_core::{Artifact, Automation, AutomationInboxEntry, Run, RunEvent, RunMessage};

use crate::StoreError;

/// Current snapshot schema version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

/// Store contents at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version
    #[serde(rename = "v")]
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<Run>,
    /// Every run's events, grouped by run, ascending seq
    pub events: Vec<RunEvent>,
    #[serde(default)]
    pub messages: Vec<RunMessage>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub automations: Vec<Automation>,
    #[serde(default)]
    pub inbox: Vec<AutomationInboxEntry>,
}

/// Write `snapshot` atomically (temp file + rename).
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp)?;
    let mut encoder = zstd::stream::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)?;
    serde_json::to_writer(&mut encoder, snapshot)?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    fs::rename(&tmp, path)?;

    tracing::info!(
        path = %path.display(),
        runs = snapshot.runs.len(),
        events = snapshot.events.len(),
        "saved snapshot"
    );
    Ok(())
}

/// Load a snapshot. Returns `None` when the file does not exist.
///
/// Undecodable snapshots and snapshots from a newer schema are moved aside
/// to a `.bak` path and treated as absent.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let compressed = fs::read(path)?;
    let decoded = match zstd::stream::decode_all(compressed.as_slice()) {
        Ok(decoded) => decoded,
        Err(e) => {
            quarantine(path, &e.to_string())?;
            return Ok(None);
        }
    };
    let snapshot: Snapshot = match serde_json::from_slice(&decoded) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            quarantine(path, &e.to_string())?;
            return Ok(None);
        }
    };
    if snapshot.version > CURRENT_SNAPSHOT_VERSION {
        quarantine(path, &format!("unsupported snapshot version {}", snapshot.version))?;
        return Ok(None);
    }
    Ok(Some(snapshot))
}

fn quarantine(path: &Path, reason: &str) -> Result<(), StoreError> {
    let bak = rotate_bak_path(path);
    tracing::warn!(path = %path.display(), bak = %bak.display(), reason, "corrupt snapshot moved aside");
    fs::rename(path, &bak)?;
    Ok(())
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups; the oldest is removed at the limit.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
