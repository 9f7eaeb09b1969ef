//! End-to-end runs of the trenew binary in the foreground

mod helpers;

use assert_cmd::Command;
use helpers::TestEnvironment;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use predicates::prelude::*;
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(path: &std::path::Path, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if path.exists() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn test_fail_fast_exits_when_aklog_missing() {
    let env = TestEnvironment::new().unwrap();

    let mut cmd = Command::cargo_bin("trenew").unwrap();
    cmd.arg("--pid-file").arg(env.pid_file())
       .arg("--aklog-path").arg(env.path().join("missing-aklog"))
       .arg("-x")
       .timeout(Duration::from_secs(20));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("could not be launched"));

    assert!(!env.pid_file().exists());
}

#[test]
fn test_failing_aklog_is_retried_and_warned() {
    let env = TestEnvironment::new().unwrap();
    let aklog = env.script("aklog", "exit 7").unwrap();

    let mut cmd = Command::cargo_bin("trenew").unwrap();
    cmd.arg("--pid-file").arg(env.pid_file())
       .arg("--aklog-path").arg(&aklog)
       .arg("--obsess").arg("1s")
       .arg("--keep-alive").arg("1h")
       .arg("--verbose")
       .timeout(Duration::from_secs(3));

    // Still running when the timeout kills it
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("returned 7"))
        .stdout(predicate::str::contains("obsessing every 1 seconds"));
}

#[test]
fn test_second_instance_refused() {
    let env = TestEnvironment::new().unwrap();
    let aklog = env.script("aklog", "exit 0").unwrap();
    let bin = assert_cmd::cargo::cargo_bin("trenew");

    let mut first = std::process::Command::new(&bin)
        .arg("--pid-file").arg(env.pid_file())
        .arg("--aklog-path").arg(&aklog)
        .arg("--keep-alive").arg("1h")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    assert!(wait_for(&env.pid_file(), Duration::from_secs(10)));

    let mut second = Command::new(&bin);
    second.arg("--pid-file").arg(env.pid_file())
          .arg("--aklog-path").arg(&aklog)
          .timeout(Duration::from_secs(10));
    second.assert()
        .failure()
        .stderr(predicate::str::contains("already running"));

    first.kill().unwrap();
    first.wait().unwrap();
}

#[test]
fn test_sigterm_shuts_down_cleanly() {
    let env = TestEnvironment::new().unwrap();
    let aklog = env.script("aklog", "exit 0").unwrap();

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("trenew"))
        .arg("--pid-file").arg(env.pid_file())
        .arg("--aklog-path").arg(&aklog)
        .arg("--keep-alive").arg("1h")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    assert!(wait_for(&env.pid_file(), Duration::from_secs(10)));
    // Give the runtime time to install its signal handlers
    thread::sleep(Duration::from_millis(500));

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let status = child.wait().unwrap();

    assert!(status.success());
    assert!(!env.pid_file().exists(), "pid file should be removed on shutdown");
}

#[test]
fn test_sigterm_kills_and_reaps_running_aklog() {
    let env = TestEnvironment::new().unwrap();
    let child_pid_file = env.path().join("aklog.pid");
    let aklog = env
        .script(
            "aklog",
            &format!("echo $$ > '{}'\nexec sleep 30", child_pid_file.display()),
        )
        .unwrap();

    let mut daemon = std::process::Command::new(assert_cmd::cargo::cargo_bin("trenew"))
        .arg("--pid-file").arg(env.pid_file())
        .arg("--aklog-path").arg(&aklog)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    assert!(wait_for(&child_pid_file, Duration::from_secs(10)));
    // The pid is written before exec, so wait until the file is complete
    let mut aklog_pid = String::new();
    let start = Instant::now();
    while aklog_pid.trim().is_empty() && start.elapsed() < Duration::from_secs(5) {
        aklog_pid = std::fs::read_to_string(&child_pid_file).unwrap();
        thread::sleep(Duration::from_millis(50));
    }
    let proc_entry = std::path::PathBuf::from(format!("/proc/{}", aklog_pid.trim()));
    assert!(proc_entry.exists(), "aklog should still be running");

    kill(Pid::from_raw(daemon.id() as i32), Signal::SIGTERM).unwrap();
    let status = daemon.wait().unwrap();

    assert!(status.success());
    assert!(
        !proc_entry.exists(),
        "aklog should be killed and reaped, not left as a zombie"
    );
    assert!(!env.pid_file().exists());
}
