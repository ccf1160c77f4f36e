// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tl_core::test_support::process_event;
use tl_core::ProcessStatus;

#[test]
fn process_fields_only_move_forward() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    p.apply_event(
        &process_event(
            &run_id(),
            2,
            "process.started",
            json!({"process_id": "dev", "command": "npm run dev", "pid": 4242}),
        )
        .at(ts(2)),
    )
    .unwrap();
    p.apply_event(&process_event(
        &run_id(),
        3,
        "process.updated",
        json!({"process_id": "dev", "preview_urls": ["http://localhost:3000"]}),
    ))
    .unwrap();
    p.apply_event(&process_event(
        &run_id(),
        4,
        "process.updated",
        json!({"process_id": "dev", "preview_url": "http://localhost:3001", "command": ""}),
    ))
    .unwrap();

    let process = &p.processes["dev"];
    assert_eq!(process.command.as_deref(), Some("npm run dev"));
    assert_eq!(process.pid, Some(4242));
    assert_eq!(process.status, ProcessStatus::Running);
    assert_eq!(process.started_at, Some(ts(2)));
    assert_eq!(process.preview_urls.len(), 2);
    assert!(process.preview_urls.contains("http://localhost:3000"));
}

#[test]
fn exit_reflects_latest_observation() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    p.apply_event(&process_event(&run_id(), 2, "process.started", json!({"process_id": "dev"})))
        .unwrap();
    p.apply_event(&process_event(
        &run_id(),
        3,
        "process_exited",
        json!({"process_id": "dev", "exit_code": 1, "signal": "SIGTERM", "status": "killed"}),
    ))
    .unwrap();
    {
        let process = &p.processes["dev"];
        assert_eq!(process.status, ProcessStatus::Killed);
        assert_eq!(process.exit_code, Some(1));
        assert_eq!(process.signal.as_deref(), Some("SIGTERM"));
        assert!(!process.is_alive());
    }

    p.apply_event(&process_event(&run_id(), 4, "process.started", json!({"process_id": "dev", "pid": 7})))
        .unwrap();
    let process = &p.processes["dev"];
    assert_eq!(process.status, ProcessStatus::Running);
    assert_eq!(process.exit_code, None);
    assert_eq!(process.signal, None);
    assert_eq!(process.pid, Some(7));
}

#[test]
fn output_records_last_line() {
    let mut p = projection();
    p.apply_event(&run_started(&run_id(), 1)).unwrap();
    p.apply_event(&process_event(
        &run_id(),
        2,
        "process.output",
        json!({"process_id": "dev", "line": "ready on :3000"}),
    ))
    .unwrap();
    let process = &p.processes["dev"];
    assert_eq!(process.last_output.as_deref(), Some("ready on :3000"));
    assert_eq!(process.status, ProcessStatus::Starting);
}
