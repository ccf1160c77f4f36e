// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity adapter backed by shell hook commands.
//!
//! Each activity runs its configured command with `sh -c`, passing context
//! through `TL_*` environment variables. Exit 0 is success, exit 75
//! (`EX_TEMPFAIL`) or a timeout is transient, anything else is terminal.
//! Activities without a hook succeed with neutral defaults.

use super::{ActivityAdapter, ActivityError, ExecutionOutput, PlanOutput, VerifyOutput};
use crate::subprocess::{run_with_timeout, SubprocessError, EX_TEMPFAIL, HOOK_TIMEOUT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tl_core::RunId;

fn default_timeout_secs() -> u64 {
    HOOK_TIMEOUT.as_secs()
}

/// Hook commands, one per activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptHooks {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub execute: Option<String>,
    #[serde(default)]
    pub verify: Option<String>,
    #[serde(default)]
    pub on_failure: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScriptHooks {
    fn default() -> Self {
        Self { plan: None, execute: None, verify: None, on_failure: None, timeout_secs: default_timeout_secs() }
    }
}

/// Runs [`ScriptHooks`] as subprocesses.
#[derive(Debug, Clone)]
pub struct ScriptActivityAdapter {
    hooks: Arc<ScriptHooks>,
    cwd: Option<PathBuf>,
}

struct HookEnv<'a> {
    run_id: &'a RunId,
    message: Option<&'a str>,
    plan_id: Option<&'a str>,
    error: Option<&'a str>,
}

impl ScriptActivityAdapter {
    pub fn new(hooks: ScriptHooks) -> Self {
        Self { hooks: Arc::new(hooks), cwd: None }
    }

    /// Run hooks from `cwd` instead of the daemon's working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.hooks.timeout_secs.max(1))
    }

    /// Run one hook, returning its trimmed stdout.
    async fn run_hook(&self, name: &str, command: &str, env: HookEnv<'_>) -> Result<String, ActivityError> {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command).env("TL_RUN_ID", env.run_id.as_str());
        if let Some(message) = env.message {
            cmd.env("TL_MESSAGE", message);
        }
        if let Some(plan_id) = env.plan_id {
            cmd.env("TL_PLAN_ID", plan_id);
        }
        if let Some(error) = env.error {
            cmd.env("TL_ERROR", error);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        tracing::info!(run_id = %env.run_id, hook = name, "running activity hook");
        let output = match run_with_timeout(cmd, self.timeout(), name).await {
            Ok(output) => output,
            Err(e @ SubprocessError::Timeout { .. }) => return Err(ActivityError::Transient(e.to_string())),
            Err(e @ SubprocessError::Io { .. }) => return Err(ActivityError::Terminal(e.to_string())),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Ok(stdout),
            Some(EX_TEMPFAIL) => {
                tracing::warn!(run_id = %env.run_id, hook = name, %stderr, "hook requested retry");
                Err(ActivityError::Transient(describe_failure(name, EX_TEMPFAIL, &stderr)))
            }
            code => {
                let code = code.unwrap_or(-1);
                tracing::warn!(run_id = %env.run_id, hook = name, code, %stderr, "hook failed");
                Err(ActivityError::Terminal(describe_failure(name, code, &stderr)))
            }
        }
    }
}

fn describe_failure(name: &str, code: i32, stderr: &str) -> String {
    if stderr.is_empty() {
        format!("{name} hook exited with {code}")
    } else {
        format!("{name} hook exited with {code}: {stderr}")
    }
}

#[async_trait]
impl ActivityAdapter for ScriptActivityAdapter {
    async fn plan_execution(&self, run_id: &RunId, message: &str) -> Result<PlanOutput, ActivityError> {
        let Some(command) = &self.hooks.plan else {
            return Ok(PlanOutput { plan_id: format!("plan-{}", run_id.suffix()) });
        };
        let env = HookEnv { run_id, message: Some(message), plan_id: None, error: None };
        let stdout = self.run_hook("plan", command, env).await?;
        if stdout.is_empty() {
            return Err(ActivityError::Terminal("plan hook printed no plan id".to_string()));
        }
        Ok(PlanOutput { plan_id: stdout })
    }

    async fn execute_plan(
        &self,
        run_id: &RunId,
        message: &str,
        plan_id: &str,
    ) -> Result<ExecutionOutput, ActivityError> {
        let result = match &self.hooks.execute {
            Some(command) => {
                let env = HookEnv { run_id, message: Some(message), plan_id: Some(plan_id), error: None };
                self.run_hook("execute", command, env).await?
            }
            None => String::new(),
        };
        Ok(ExecutionOutput { plan_id: plan_id.to_string(), result })
    }

    async fn verify_execution(
        &self,
        run_id: &RunId,
        message: &str,
        plan_id: &str,
    ) -> Result<VerifyOutput, ActivityError> {
        let Some(command) = &self.hooks.verify else {
            return Ok(VerifyOutput::new("completed", "verified"));
        };
        let env = HookEnv { run_id, message: Some(message), plan_id: Some(plan_id), error: None };
        let stdout = self.run_hook("verify", command, env).await?;
        serde_json::from_str(&stdout)
            .map_err(|e| ActivityError::Terminal(format!("verify hook printed invalid JSON: {e}")))
    }

    async fn handle_run_failure(&self, run_id: &RunId, error: &str) -> Result<(), ActivityError> {
        let Some(command) = &self.hooks.on_failure else {
            return Ok(());
        };
        let env = HookEnv { run_id, message: None, plan_id: None, error: Some(error) };
        self.run_hook("on_failure", command, env).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
