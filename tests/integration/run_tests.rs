//! End-to-end runs of real commands
//!
//! These spawn `sh`, so they only run on Unix.
#![cfg(unix)]

use psrun::core::constants::polling;
use psrun::sink::{MemorySink, NullSink, RunSinks};
use psrun::{run, ProcessSupervisor, RunError, SupervisorConfig};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

fn fast_config() -> SupervisorConfig {
    SupervisorConfig::builder()
        .poll_interval(polling::FAST)
        .build()
        .unwrap()
}

struct Captured {
    runner: MemorySink,
    monitor: MemorySink,
    stdout: MemorySink,
    stderr: MemorySink,
}

fn capture() -> (RunSinks, Captured) {
    let captured = Captured {
        runner: MemorySink::new(),
        monitor: MemorySink::new(),
        stdout: MemorySink::new(),
        stderr: MemorySink::new(),
    };
    let sinks = RunSinks {
        runner: Box::new(captured.runner.clone()),
        monitor: Box::new(captured.monitor.clone()),
        stdout: Box::new(captured.stdout.clone()),
        stderr: Box::new(captured.stderr.clone()),
    };
    (sinks, captured)
}

#[test]
fn test_relays_stdout_and_reports_exit_code() {
    let mut supervisor = ProcessSupervisor::new(fast_config()).unwrap();
    let (sinks, captured) = capture();

    let result = supervisor
        .execute(&sh("printf 'line 1\\nline 2\\n'"), &sinks)
        .unwrap();

    assert_eq!(captured.stdout.lines(), vec!["line 1", "line 2"]);
    assert!(captured.stderr.lines().is_empty());
    assert_eq!(result.exit_code, Some(0));
}

#[test]
fn test_relays_stderr_and_non_zero_exit() {
    let mut supervisor = ProcessSupervisor::new(fast_config()).unwrap();
    let (sinks, captured) = capture();

    let result = supervisor
        .execute(&sh("echo oops >&2; sleep 0.2; echo done; exit 3"), &sinks)
        .unwrap();

    assert_eq!(captured.stdout.lines(), vec!["done"]);
    assert_eq!(captured.stderr.lines(), vec!["oops"]);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.running_time_ms >= 200);
}

#[test]
fn test_one_snapshot_per_tick_plus_final() {
    let mut supervisor = ProcessSupervisor::new(fast_config()).unwrap();
    let (sinks, captured) = capture();

    supervisor.execute(&sh("sleep 0.3"), &sinks).unwrap();

    let snapshots = captured.monitor.lines();
    assert!(snapshots.len() >= 2, "got {} snapshots", snapshots.len());
    for line in &snapshots {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("pid").is_some());
        if value.get("error").is_none() {
            assert!(value["swap_memory"].is_null());
            assert!(value["all_pids"].is_array());
        }
    }
}

#[test]
fn test_reporter_narrates_a_run() {
    let (sinks, captured) = capture();

    let result = run(&sh("true"), fast_config(), &sinks).unwrap();

    assert_eq!(result.map(|r| r.exit_code), Some(Some(0)));
    let lines = captured.runner.lines();
    assert_eq!(lines[0], "-- ------------------------");
    assert_eq!(lines[1], "-- Executing sh -c true ...");
    assert_eq!(lines[2], "-- Exit code: 0");
    assert!(lines[3].starts_with("-- Run time: "));
    assert!(lines[3].ends_with("ms"));
}

#[test]
fn test_timeout_terminates_then_kills() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("terminated");
    let script = format!(
        "trap 'echo term > {}' TERM; while :; do sleep 0.05; done",
        marker.display()
    );
    let config = SupervisorConfig::builder()
        .poll_interval_ms(100)
        .timeout_secs(1)
        .shutdown_secs(1)
        .build()
        .unwrap();
    let mut supervisor = ProcessSupervisor::new(config).unwrap();
    let (sinks, _captured) = capture();

    let start = Instant::now();
    let err = supervisor.execute(&sh(&script), &sinks).unwrap_err();

    assert!(matches!(err, RunError::ProcTimeout { .. }));
    // the trap ran, so the child got the graceful signal and survived it
    assert_eq!(fs::read_to_string(&marker).unwrap().trim(), "term");
    // it ignores SIGTERM, so only the kill after the grace period ended it
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "stopped after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(10), "stopped after {:?}", elapsed);
}

#[test]
fn test_reporter_reports_timeout() {
    let config = SupervisorConfig::builder()
        .poll_interval_ms(50)
        .timeout_secs(1)
        .shutdown_secs(1)
        .build()
        .unwrap();
    let (sinks, captured) = capture();

    let result = run(&sh("sleep 30"), config, &sinks).unwrap();

    assert!(result.is_none());
    let lines = captured.runner.lines();
    assert_eq!(
        lines.last().unwrap(),
        "-- ERROR: Timed out after 1 secs: sh -c 'sleep 30'"
    );
}

#[test]
fn test_permission_denied_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("not-executable.sh");
    fs::write(&script, "#!/bin/sh\necho should not run\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();

    let mut supervisor = ProcessSupervisor::new(fast_config()).unwrap();
    let (sinks, captured) = capture();
    let cmd = vec![script.display().to_string()];

    let err = supervisor.execute(&cmd, &sinks).unwrap_err();

    assert!(matches!(err, RunError::PermissionDenied(_)));
    assert!(err.to_string().starts_with("Permission denied. Cannot execute: "));
    assert!(captured.stdout.lines().is_empty());
    assert!(captured.monitor.lines().is_empty());
}

#[test]
fn test_reporter_reports_permission_denied() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("locked.sh");
    fs::write(&script, "#!/bin/sh\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o600)).unwrap();
    let (sinks, captured) = capture();

    let result = run(&[script.display().to_string()], fast_config(), &sinks).unwrap();

    assert!(result.is_none());
    assert!(captured
        .runner
        .lines()
        .last()
        .unwrap()
        .starts_with("-- ERROR: Permission denied. Cannot execute: "));
}

#[test]
fn test_missing_command_propagates() {
    let sinks = RunSinks {
        runner: Box::new(NullSink),
        monitor: Box::new(NullSink),
        stdout: Box::new(NullSink),
        stderr: Box::new(NullSink),
    };

    let err = run(
        &["/nonexistent/psrun-no-such-command".to_string()],
        fast_config(),
        &sinks,
    )
    .unwrap_err();

    assert!(matches!(err, RunError::Io(_)));
}
