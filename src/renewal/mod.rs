//! The renewal loop: run aklog, pick the next interval, sleep, repeat
//!
//! Each pass moves through two states:
//! - `Renewing`: invoke the renewal command and inspect its result. Success
//!   selects the keep-alive interval, any failure the obsess interval.
//! - `Sleeping(d)`: wait `d`, then renew again.
//!
//! [`RenewalLoop::advance`] performs exactly one transition so callers can
//! drive a bounded number of iterations with fake runners and sleepers.

pub mod runner;
pub mod shutdown;

pub use runner::{
    CommandOutput, CommandRunner, Invocation, InvocationError, ProcessRunner, Sleeper,
    TokioSleeper,
};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};

use crate::daemon::logging::LogSink;
use crate::models::RenewalConfig;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Where the loop is between transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Renewing,
    Sleeping(Duration),
}

/// Conditions that end the loop
#[derive(Debug, Error)]
pub enum RenewalError {
    /// The renewal command could not be launched and fail-fast is set
    #[error("renewal command could not be launched: {0}")]
    Launch(#[source] InvocationError),
    /// Anything unexpected after launch; retrying blindly could let the token lapse
    #[error("renewal command failed unexpectedly: {0}")]
    Internal(#[source] InvocationError),
    /// Shutdown was requested; nothing is left running
    #[error("renewal loop stopped by shutdown")]
    Cancelled,
}

/// Run the production loop until a fatal error or `shutdown` fires.
///
/// After shutdown the result is `Err(RenewalError::Cancelled)`, returned only
/// once any running renewal command has been killed and reaped.
pub async fn run_renewal_loop(
    config: RenewalConfig,
    sink: Arc<dyn LogSink>,
    shutdown: Shutdown,
) -> Result<Infallible, RenewalError> {
    let runner = ProcessRunner::new(shutdown.clone());
    let sleeper = TokioSleeper::new(shutdown.clone());

    RenewalLoop::new(config, runner, sleeper, sink)
        .with_shutdown(shutdown)
        .run()
        .await
}

pub struct RenewalLoop<R, S> {
    config: RenewalConfig,
    invocation: Invocation,
    runner: R,
    sleeper: S,
    sink: Arc<dyn LogSink>,
    shutdown: Shutdown,
    state: LoopState,
    attempts: u64,
    consecutive_failures: u64,
}

impl<R: CommandRunner, S: Sleeper> RenewalLoop<R, S> {
    pub fn new(config: RenewalConfig, runner: R, sleeper: S, sink: Arc<dyn LogSink>) -> Self {
        let invocation = Invocation::for_config(&config);

        Self {
            config,
            invocation,
            runner,
            sleeper,
            sink,
            shutdown: Shutdown::never(),
            state: LoopState::Renewing,
            attempts: 0,
            consecutive_failures: 0,
        }
    }

    /// Stop at the next transition once `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Renewal attempts started so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Perform one state transition and return the new state
    pub async fn advance(&mut self) -> Result<LoopState, RenewalError> {
        if self.shutdown.is_triggered() {
            return Err(RenewalError::Cancelled);
        }

        self.state = match self.state {
            LoopState::Renewing => LoopState::Sleeping(self.renew().await?),
            LoopState::Sleeping(duration) => {
                self.sleeper.sleep(duration).await;
                LoopState::Renewing
            }
        };
        Ok(self.state)
    }

    /// Advance forever; only a fatal error stops the loop
    pub async fn run(&mut self) -> Result<Infallible, RenewalError> {
        loop {
            self.advance().await?;
        }
    }

    async fn renew(&mut self) -> Result<Duration, RenewalError> {
        self.attempts += 1;
        self.sink.debug(&format!("renewal attempt {}", self.attempts));
        self.sink.info(&format!("running {}", self.invocation));

        let renewed = match self.runner.run(&self.invocation).await {
            Ok(output) => {
                self.log_output(&output);
                self.check_status(&output)
            }
            Err(err @ InvocationError::Spawn { .. }) => {
                if self.config.fail_fast {
                    return Err(RenewalError::Launch(err));
                }
                self.sink.warn(&err.to_string());
                false
            }
            Err(InvocationError::Cancelled { .. }) => return Err(RenewalError::Cancelled),
            Err(err) => return Err(RenewalError::Internal(err)),
        };

        Ok(self.next_interval(renewed))
    }

    fn log_output(&self, output: &CommandOutput) {
        if !output.stdout.is_empty() {
            self.sink.debug(output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            self.sink.debug(output.stderr.trim_end());
        }

        let record = json!({
            "event": "renewal_invocation",
            "attempt": self.attempts,
            "invocation": &self.invocation,
            "result": output,
        });
        self.sink.debug(&record.to_string());
    }

    fn check_status(&self, output: &CommandOutput) -> bool {
        if output.success() {
            return true;
        }

        let program = self.invocation.program.display();
        let message = match (output.code, output.signal) {
            (Some(code), _) => format!("{} returned {}", program, code),
            (None, Some(signal)) => format!("{} terminated by signal {}", program, signal),
            (None, None) => format!("{} exited with unknown status", program),
        };
        self.sink.warn(&message);
        false
    }

    fn next_interval(&mut self, renewed: bool) -> Duration {
        if renewed {
            if self.consecutive_failures > 0 {
                self.sink.info(&format!(
                    "token renewed after {} failed attempts",
                    self.consecutive_failures
                ));
            }
            self.consecutive_failures = 0;

            let interval = self.config.keep_alive_interval;
            self.sink.debug(&format!(
                "token looks good, sleeping for {} seconds",
                interval.as_secs()
            ));
            interval
        } else {
            self.consecutive_failures += 1;

            let interval = self.config.obsess_interval;
            self.sink.debug(&format!(
                "no good token, obsessing every {} seconds",
                interval.as_secs()
            ));
            interval
        }
    }
}
