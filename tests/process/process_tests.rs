use std::fs;
use std::time::{Duration, Instant};

use fuzzeval::types::AppError;
use fuzzeval::{Capture, Invocation, ProcessRunner};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn sh(script: &str) -> Invocation {
    Invocation::new("/bin/sh").arg("-c").arg(script)
}

#[test]
fn exit_after_first_termination_request_is_returned() {
    let runner = ProcessRunner::with_grace(Duration::from_secs(5));
    let invocation = sh("trap 'sleep 1; exit 7' TERM; while true; do sleep 0.1; done");

    let started = Instant::now();
    let output = runner
        .run(&invocation, Capture::Discard, Some(Duration::from_secs(1)))
        .expect("process exits within its grace period");

    assert_eq!(output.code, 7);
    // One timeout plus the trap's sleep, well short of a second grace period
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn process_ignoring_termination_is_killed_and_reported() {
    let runner = ProcessRunner::with_grace(Duration::from_millis(200));
    let invocation = sh("trap '' TERM; while true; do sleep 0.1; done");

    let result = runner.run(&invocation, Capture::Discard, Some(Duration::from_millis(200)));
    match result {
        Err(AppError::Unterminated { command }) => assert_eq!(command, "/bin/sh"),
        other => panic!("expected Unterminated, got {other:?}"),
    }
}

#[test]
fn no_timeout_waits_for_natural_exit() {
    let runner = ProcessRunner::new();
    let output = runner
        .run(&sh("sleep 0.2; exit 4"), Capture::Discard, None)
        .unwrap();
    assert_eq!(output.code, 4);
    assert!(!output.success());
}

#[test]
fn logfile_receives_stdout_and_stderr() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("tool.log");

    let output = ProcessRunner::new()
        .run(
            &sh("echo out; echo err >&2; exit 3"),
            Capture::Logfile(log.clone()),
            None,
        )
        .unwrap();

    assert_eq!(output.code, 3);
    assert!(output.stdout.is_empty());
    assert_eq!(fs::read_to_string(&log).unwrap(), "out\nerr\n");
}

#[test]
fn stdout_capture_drops_stderr() {
    let output = ProcessRunner::new()
        .run(&sh("echo hello; echo noise >&2"), Capture::Stdout, None)
        .unwrap();
    assert!(output.success());
    assert_eq!(output.stdout_lossy(), "hello\n");
}

#[test]
fn environment_is_passed_to_the_child() {
    let output = ProcessRunner::new()
        .run(
            &sh("echo $FUZZEVAL_TEST_VALUE").env("FUZZEVAL_TEST_VALUE", "bar"),
            Capture::Stdout,
            None,
        )
        .unwrap();
    assert_eq!(output.stdout_lossy(), "bar\n");
}

#[test]
fn signal_exit_maps_to_shell_convention() {
    let output = ProcessRunner::new()
        .run(&sh("kill -9 $$"), Capture::Discard, None)
        .unwrap();
    assert_eq!(output.code, 128 + 9);
}

#[test]
fn missing_program_is_an_error() {
    let result = ProcessRunner::new().run(
        &Invocation::new("/nonexistent/fuzzeval-tool"),
        Capture::Discard,
        None,
    );
    assert!(matches!(result, Err(AppError::Io(_))));
}
