//! Integration tests for the `burrow` binary.
//!
//! The unprivileged tests point `--root` and `--image-root` at scratch
//! directories. The lifecycle scenario needs root, cgroup v1, and
//! `/root/busybox.tar`, so it is ignored by default:
//!
//! ```text
//! sudo -E cargo test -p burrow-cli -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::process::{Command, Output};

fn burrow(state: &Path, images: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_burrow"))
        .arg("--root")
        .arg(state)
        .arg("--image-root")
        .arg(images)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("spawn burrow")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn ps_on_empty_root_prints_only_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let out = burrow(&dir.path().join("run"), dir.path(), &["ps"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "ID  NAME  PID  STATUS  COMMAND  CREATED\n");
}

#[test]
fn ps_lists_persisted_records() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("run");
    std::fs::create_dir_all(state.join("c1")).unwrap();
    std::fs::write(
        state.join("c1/config.json"),
        r#"{"pid":"","id":"0123456789","name":"c1","command":"top","createTime":"2024-05-01 10:00:00","status":"stopped","volume":"","portmapping":[]}"#,
    )
    .unwrap();

    let out = burrow(&state, dir.path(), &["ps"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.lines().nth(1).unwrap().starts_with("0123456789  c1"), "{text}");
    assert!(text.contains("stopped"));
}

#[test]
fn operations_on_unknown_containers_fail() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("run");
    for args in [&["stop", "ghost"][..], &["rm", "ghost"], &["logs", "ghost"]] {
        let out = burrow(&state, dir.path(), args);
        assert!(!out.status.success(), "{args:?}");
        let err = String::from_utf8_lossy(&out.stderr);
        assert!(err.contains("ghost"), "{args:?}: {err}");
    }
}

#[test]
fn logs_print_the_captured_output() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("run");
    std::fs::create_dir_all(state.join("c1")).unwrap();
    std::fs::write(state.join("c1/container.log"), "hello\n").unwrap();

    let out = burrow(&state, dir.path(), &["logs", "c1"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "hello\n");
}

#[test]
fn network_list_on_empty_root_prints_only_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let out = burrow(&dir.path().join("run"), dir.path(), &["network", "list"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "NAME  SUBNET  GATEWAY  DRIVER\n");
}

#[test]
fn enter_without_exec_context_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_burrow"))
        .arg("--root")
        .arg(dir.path())
        .arg("enter")
        .env_remove("BURROW_EXEC_PID")
        .env_remove("BURROW_EXEC_CMD")
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
#[ignore = "needs root, cgroup v1 and /root/busybox.tar"]
fn detached_container_runs_stops_and_is_removed() {
    let state = tempfile::tempdir().unwrap();
    let images = Path::new("/root");

    let out = burrow(
        state.path(),
        images,
        &["run", "-d", "--name", "c1", "busybox", "top", "-b"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let config = std::fs::read_to_string(state.path().join("c1/config.json")).unwrap();
    assert!(config.contains("\"name\":\"c1\""));
    assert!(config.contains("\"status\":\"running\""));
    let pid: i32 = config
        .split("\"pid\":\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .and_then(|pid| pid.parse().ok())
        .unwrap();
    assert!(Path::new(&format!("/proc/{pid}")).exists());

    assert!(burrow(state.path(), images, &["stop", "c1"]).status.success());
    let config = std::fs::read_to_string(state.path().join("c1/config.json")).unwrap();
    assert!(config.contains("\"status\":\"stopped\""));
    assert!(config.contains("\"pid\":\"\""));

    // PID 1 of a namespace ignores SIGTERM unless it installed a handler.
    let _ = Command::new("kill").args(["-9", &pid.to_string()]).status();

    assert!(burrow(state.path(), images, &["rm", "c1"]).status.success());
    assert!(!state.path().join("c1").exists());
    let mounts = std::fs::read_to_string("/proc/self/mountinfo").unwrap();
    assert!(!mounts.contains("/root/mnt/c1"));
}
