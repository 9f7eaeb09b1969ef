#![allow(dead_code)]

use async_trait::async_trait;
use log::Level;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use trenew::daemon::logging::LogSink;
use trenew::renewal::Sleeper;

/// Scratch directory holding fake aklog scripts and a pid file
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            temp_dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn pid_file(&self) -> PathBuf {
        self.path().join("trenew.pid")
    }

    /// Write an executable `/bin/sh` script standing in for aklog
    pub fn script(&self, name: &str, body: &str) -> anyhow::Result<PathBuf> {
        let path = self.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    /// A script whose exit codes follow `codes`, cycling, tracked in a counter file
    pub fn cycling_script(&self, name: &str, codes: &[i32]) -> anyhow::Result<PathBuf> {
        let counter = self.path().join(format!("{}.count", name));
        let cases: String = codes
            .iter()
            .enumerate()
            .map(|(i, code)| format!("  {}) exit {} ;;\n", i, code))
            .collect();
        let body = format!(
            "n=$(cat '{counter}' 2>/dev/null || echo 0)\n\
             echo $(( (n + 1) % {len} )) > '{counter}'\n\
             echo \"args: $*\"\n\
             case $n in\n{cases}esac",
            counter = counter.display(),
            len = codes.len(),
            cases = cases,
        );
        self.script(name, &body)
    }
}

/// Keeps every emitted line for assertions
#[derive(Default)]
pub struct RecordingSink {
    pub lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingSink {
    pub fn count(&self, level: Level) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn emit(&self, level: Level, message: &str) {
        self.lines.lock().unwrap().push((level, message.to_string()));
    }
}

/// Records requested sleeps instead of waiting
#[derive(Default)]
pub struct FakeClock {
    pub slept: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn seconds(&self) -> Vec<u64> {
        self.slept.lock().unwrap().iter().map(Duration::as_secs).collect()
    }
}

#[async_trait]
impl Sleeper for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
