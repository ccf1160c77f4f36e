// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `taskloop.toml` parsing and the settings the daemon runs with.
//!
//! File values are the base; `TL_*` environment overrides win.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tl_adapters::ScriptHooks;
use tl_core::AutomationSpec;
use tl_engine::{RetryPolicy, RunConfig, SchedulerConfig, DEFAULT_RUN_DEADLINE};

use crate::lifecycle::LifecycleError;

/// Where finished automation executions are announced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    #[default]
    Desktop,
    Log,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    /// `0` disables the deadline.
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSection {
    pub poll_interval_secs: Option<u64>,
    pub execution_lease_secs: Option<u64>,
}

/// Contents of `taskloop.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub hooks: ScriptHooks,
    pub retry: RetryPolicy,
    pub run: RunSection,
    pub scheduler: SchedulerSection,
    pub notify: NotifyMode,
    /// Hook working directory; relative paths resolve against the state dir.
    pub workdir: Option<PathBuf>,
    /// Seed automations, synced by name on every startup
    #[serde(rename = "automation")]
    pub automations: Vec<AutomationSpec>,
}

impl FileConfig {
    pub fn parse(raw: &str, path: &Path) -> Result<Self, LifecycleError> {
        toml::from_str(raw).map_err(|e| LifecycleError::Config { path: path.to_path_buf(), message: e.to_string() })
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, LifecycleError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Environment overrides, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub poll_interval: Option<Duration>,
    pub run_deadline: Option<Duration>,
    pub automation_lease: Option<Duration>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            poll_interval: crate::env::poll_interval(),
            run_deadline: crate::env::run_deadline(),
            automation_lease: crate::env::automation_lease(),
        }
    }
}

/// Fully resolved daemon settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub hooks: ScriptHooks,
    pub workdir: Option<PathBuf>,
    pub run: RunConfig,
    pub scheduler: SchedulerConfig,
    pub notify: NotifyMode,
    pub automations: Vec<AutomationSpec>,
}

impl Settings {
    pub fn resolve(file: FileConfig, env: &EnvOverrides, state_dir: &Path) -> Self {
        let deadline = env
            .run_deadline
            .or(file.run.deadline_secs.map(Duration::from_secs))
            .unwrap_or(DEFAULT_RUN_DEADLINE);
        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            poll_interval: env
                .poll_interval
                .or(file.scheduler.poll_interval_secs.map(Duration::from_secs))
                .unwrap_or(defaults.poll_interval),
            execution_lease: env
                .automation_lease
                .or(file.scheduler.execution_lease_secs.map(Duration::from_secs))
                .unwrap_or(defaults.execution_lease),
        };

        Self {
            hooks: file.hooks,
            workdir: file.workdir.map(|dir| state_dir.join(dir)),
            run: RunConfig { retry: file.retry, deadline: (!deadline.is_zero()).then_some(deadline) },
            scheduler,
            notify: file.notify,
            automations: file.automations,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
