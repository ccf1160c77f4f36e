// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn run_id() -> RunId {
    RunId::from_string("run-abc")
}

fn adapter(hooks: ScriptHooks) -> ScriptActivityAdapter {
    ScriptActivityAdapter::new(hooks)
}

#[tokio::test]
async fn missing_hooks_use_defaults() {
    let a = adapter(ScriptHooks::default());
    assert_eq!(a.plan_execution(&run_id(), "hi").await.unwrap().plan_id, "plan-abc");
    let exec = a.execute_plan(&run_id(), "hi", "p1").await.unwrap();
    assert_eq!(exec, ExecutionOutput { plan_id: "p1".to_string(), result: String::new() });
    assert_eq!(a.verify_execution(&run_id(), "hi", "p1").await.unwrap(), VerifyOutput::new("completed", "verified"));
    a.handle_run_failure(&run_id(), "boom").await.unwrap();
}

#[tokio::test]
async fn plan_hook_stdout_is_plan_id() {
    let a = adapter(ScriptHooks {
        plan: Some("echo \"plan-for-$TL_RUN_ID\"".to_string()),
        ..ScriptHooks::default()
    });
    assert_eq!(a.plan_execution(&run_id(), "hi").await.unwrap().plan_id, "plan-for-run-abc");
}

#[tokio::test]
async fn execute_hook_sees_message_and_plan() {
    let a = adapter(ScriptHooks {
        execute: Some("printf '%s|%s' \"$TL_MESSAGE\" \"$TL_PLAN_ID\"".to_string()),
        ..ScriptHooks::default()
    });
    let out = a.execute_plan(&run_id(), "do the thing", "p9").await.unwrap();
    assert_eq!(out.result, "do the thing|p9");
}

#[tokio::test]
async fn verify_hook_parses_json() {
    let a = adapter(ScriptHooks {
        verify: Some(r#"echo '{"status":"partial","completion_reason":"partially_verified","diagnostics":["1 flaky"]}'"#.to_string()),
        ..ScriptHooks::default()
    });
    let out = a.verify_execution(&run_id(), "m", "p").await.unwrap();
    assert_eq!(out.status, "partial");
    assert_eq!(out.completion_reason, "partially_verified");
    assert_eq!(out.diagnostics, vec!["1 flaky"]);
}

#[tokio::test]
async fn verify_hook_invalid_json_is_terminal() {
    let a = adapter(ScriptHooks { verify: Some("echo nope".to_string()), ..ScriptHooks::default() });
    let err = a.verify_execution(&run_id(), "m", "p").await.unwrap_err();
    assert!(!err.is_retryable());
}

#[parameterized(
    tempfail = { "echo busy >&2; exit 75", true },
    generic_failure = { "echo broken >&2; exit 1", false },
    not_found = { "exit 127", false },
)]
fn exit_code_classification(script: &str, retryable: bool) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let a = adapter(ScriptHooks { execute: Some(script.to_string()), ..ScriptHooks::default() });
    let err = rt.block_on(a.execute_plan(&run_id(), "m", "p")).unwrap_err();
    assert_eq!(err.is_retryable(), retryable);
    assert!(err.message().contains("execute hook exited with"));
}

#[tokio::test]
async fn stderr_is_included_in_terminal_error() {
    let a = adapter(ScriptHooks { execute: Some("echo 'activity failed' >&2; exit 2".to_string()), ..ScriptHooks::default() });
    let err = a.execute_plan(&run_id(), "m", "p").await.unwrap_err();
    assert_eq!(err, ActivityError::Terminal("execute hook exited with 2: activity failed".to_string()));
}

#[tokio::test]
async fn timeout_is_transient() {
    let a = adapter(ScriptHooks { plan: Some("sleep 5".to_string()), timeout_secs: 1, ..ScriptHooks::default() });
    let err = a.plan_execution(&run_id(), "m").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn failure_hook_receives_error() {
    let dir = tempfile::tempdir().unwrap();
    let a = adapter(ScriptHooks {
        on_failure: Some("printf '%s' \"$TL_ERROR\" > failure.txt".to_string()),
        ..ScriptHooks::default()
    })
    .with_cwd(dir.path());
    a.handle_run_failure(&run_id(), "execution: boom").await.unwrap();
    let written = std::fs::read_to_string(dir.path().join("failure.txt")).unwrap();
    assert_eq!(written, "execution: boom");
}

#[test]
fn hooks_deserialize_with_default_timeout() {
    let hooks: ScriptHooks = serde_json::from_str(r#"{"plan": "echo p"}"#).unwrap();
    assert_eq!(hooks.plan.as_deref(), Some("echo p"));
    assert_eq!(hooks.timeout_secs, 600);
}
