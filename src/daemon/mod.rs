//! Daemon module: the process lifecycle around the renewal loop
//!
//! This module provides functionality to run trenew as a user daemon:
//! - PID file locking so only one instance runs per user
//! - Optional detachment from the controlling terminal
//! - Journal/syslog/stdout log sink composition
//! - Signal handling that kills and reaps an in-flight renewal before exiting

pub mod logging;
pub mod pidfile;

use crate::constants::DAEMON_UMASK;
use crate::daemon::logging::LogSink;
use crate::daemon::pidfile::PidLock;
use crate::models::{DaemonOptions, Settings};
use crate::renewal::{run_renewal_loop, shutdown_channel, RenewalError};
use anyhow::{Context, Result};
use daemonize::Daemonize;
use log::{debug, error, info, warn};
use nix::sys::stat::{umask, Mode};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};

/// Run trenew until a signal or a fatal renewal error
pub fn run(settings: Settings) -> Result<()> {
    // Taken before forking so a second instance fails on the terminal
    let mut lock = PidLock::acquire(&settings.daemon.pid_file)?;

    detach(&settings.daemon)?;
    if settings.daemon.background {
        lock.record_pid()
            .context("Failed to record daemon pid")?;
    }

    let sink = logging::build_sink(settings.renewal.verbose, settings.daemon.background);
    let max_level = sink.max_level();
    let sink: Arc<dyn LogSink> = Arc::new(sink);
    logging::install_facade(sink.clone(), max_level)
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;

    log_startup(&settings, &lock);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(supervise(settings, sink))
}

/// Fork into the background, or apply the same process setup in place
fn detach(options: &DaemonOptions) -> Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));

    if options.background {
        Daemonize::new()
            .working_directory(&home)
            .umask(DAEMON_UMASK)
            .start()
            .map_err(|e| anyhow::anyhow!("Failed to detach from terminal: {}", e))?;
    } else {
        std::env::set_current_dir(&home)
            .with_context(|| format!("Failed to change directory to {}", home.display()))?;
        umask(Mode::from_bits_truncate(DAEMON_UMASK as nix::libc::mode_t));
    }

    Ok(())
}

fn log_startup(settings: &Settings, lock: &PidLock) {
    info!(
        "trenew started, renewing with {} every {}s (obsess {}s)",
        settings.renewal.renewal_command.display(),
        settings.renewal.keep_alive_interval.as_secs(),
        settings.renewal.obsess_interval.as_secs()
    );

    let record = json!({
        "event": "daemon_startup",
        "pid": std::process::id(),
        "pid_file": lock.path().display().to_string(),
        "settings": settings,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    debug!("{}", record);

    if settings.renewal.obsess_interval.is_zero() {
        warn!("obsess interval is zero: failed renewals are retried without delay");
    }
}

/// Race the renewal loop against termination signals.
///
/// On a signal the loop is told to stop and then driven to completion, so an
/// aklog still running is killed and reaped before the process exits.
async fn supervise(settings: Settings, sink: Arc<dyn LogSink>) -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    let (trigger, shutdown) = shutdown_channel();
    let renewal = run_renewal_loop(settings.renewal, sink, shutdown);
    tokio::pin!(renewal);

    let reason = tokio::select! {
        result = &mut renewal => {
            let err: RenewalError = match result {
                Ok(never) => match never {},
                Err(err) => err,
            };
            error!("{}", err);
            log_shutdown(&err.to_string());
            return Err(err.into());
        }
        _ = terminate.recv() => "received SIGTERM",
        _ = interrupt.recv() => "received SIGINT",
    };

    info!("{}, shutting down", reason);
    trigger.fire();

    match renewal.await {
        Ok(never) => match never {},
        Err(RenewalError::Cancelled) => {}
        Err(err) => warn!("renewal loop failed during shutdown: {}", err),
    }

    log_shutdown(reason);
    Ok(())
}

fn log_shutdown(reason: &str) {
    let record = json!({
        "event": "daemon_shutdown",
        "reason": reason,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    debug!("{}", record);
}
