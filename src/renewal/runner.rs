//! Collaborators the renewal loop waits on: the external command and the clock

use crate::constants::AKLOG_DEBUG_FLAG;
use crate::models::RenewalConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use super::shutdown::Shutdown;

/// A fully resolved command line for one renewal attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// `<renewal_command> -d <renewal_args...>`
    pub fn for_config(config: &RenewalConfig) -> Self {
        let mut args = Vec::with_capacity(config.renewal_args.len() + 1);
        args.push(AKLOG_DEBUG_FLAG.to_string());
        args.extend(config.renewal_args.iter().cloned());

        Self {
            program: config.renewal_command.clone(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What a finished renewal command left behind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Exit code, absent when the child was killed by a signal
    pub code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn killed(signal: i32) -> Self {
        Self {
            signal: Some(signal),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Failures before a renewal command produced an exit status
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The executable could not be started at all
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The child started but its status or output could not be collected
    #[error("failed to collect result of {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    /// Shutdown was requested; the child has been killed and reaped
    #[error("{program} cancelled by shutdown")]
    Cancelled { program: String },
}

/// Runs a renewal command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvocationError>;
}

/// Spawns real child processes.
///
/// When shutdown fires mid-run the child is killed and waited for before
/// `run` returns, so no aklog is left behind as an orphan or zombie.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    shutdown: Shutdown,
}

impl ProcessRunner {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvocationError> {
        let program = invocation.program.display().to_string();

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvocationError::Spawn {
                program: program.clone(),
                source,
            })?;

        let finished = tokio::select! {
            result = collect(&mut child) => Some(result),
            _ = self.shutdown.triggered() => None,
        };

        match finished {
            Some(Ok((status, stdout, stderr))) => Ok(CommandOutput {
                code: status.code(),
                signal: status.signal(),
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            }),
            Some(Err(source)) => Err(InvocationError::Wait { program, source }),
            None => {
                // kill() sends SIGKILL and then waits on the child
                child
                    .kill()
                    .await
                    .map_err(|source| InvocationError::Wait {
                        program: program.clone(),
                        source,
                    })?;
                Err(InvocationError::Cancelled { program })
            }
        }
    }
}

/// Drain both pipes while waiting so a chatty child cannot block on a full pipe
async fn collect(child: &mut Child) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    tokio::try_join!(
        child.wait(),
        read_stream(stdout.as_mut()),
        read_stream(stderr.as_mut()),
    )
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<&mut R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Suspends the loop between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeping on the tokio timer, cut short by shutdown
#[derive(Debug, Clone, Default)]
pub struct TokioSleeper {
    shutdown: Shutdown,
}

impl TokioSleeper {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.triggered() => {}
        }
    }
}
