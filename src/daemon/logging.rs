//! Log sinks for the renewal daemon
//!
//! The renewal loop never touches a global logger. It is handed a [`LogSink`]
//! composed here by the host: the systemd journal when it is reachable,
//! syslog otherwise, plus a stdout echo while running in the foreground.

use crate::constants::{APP_NAME, JOURNAL_SOCKET_PATH};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use syslog::{Facility, Formatter3164, LoggerBackend};
use systemd_journal_logger::JournalLog;
use thiserror::Error;

/// Destination for log lines
pub trait LogSink: Send + Sync {
    /// Write one message at the given level
    fn emit(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
}

/// Failure to open a system log backend
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("systemd journal unavailable: {0}")]
    Journal(#[source] io::Error),
    #[error("syslog unavailable: {0}")]
    Syslog(String),
}

/// Native systemd journal protocol
pub struct JournalSink {
    inner: JournalLog,
}

impl JournalSink {
    pub fn connect() -> Result<Self, SinkError> {
        if !Path::new(JOURNAL_SOCKET_PATH).exists() {
            return Err(SinkError::Journal(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", JOURNAL_SOCKET_PATH),
            )));
        }

        let inner = JournalLog::new()
            .map_err(SinkError::Journal)?
            .with_syslog_identifier(APP_NAME.to_string());

        Ok(Self { inner })
    }
}

impl LogSink for JournalSink {
    fn emit(&self, level: Level, message: &str) {
        self.inner.log(
            &Record::builder()
                .level(level)
                .target(APP_NAME)
                .args(format_args!("{}", message))
                .build(),
        );
    }
}

/// RFC 3164 syslog over the local socket, facility `user`
pub struct SyslogSink {
    inner: Mutex<syslog::Logger<LoggerBackend, Formatter3164>>,
}

impl SyslogSink {
    pub fn connect() -> Result<Self, SinkError> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_USER,
            hostname: None,
            process: APP_NAME.to_string(),
            pid: std::process::id(),
        };

        let logger = syslog::unix(formatter).map_err(|e| SinkError::Syslog(e.to_string()))?;

        Ok(Self {
            inner: Mutex::new(logger),
        })
    }
}

impl LogSink for SyslogSink {
    fn emit(&self, level: Level, message: &str) {
        let mut logger = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Nowhere left to report a failed write
        let _ = match level {
            Level::Error => logger.err(message),
            Level::Warn => logger.warning(message),
            Level::Info => logger.info(message),
            Level::Debug | Level::Trace => logger.debug(message),
        };
    }
}

/// Foreground echo to standard output
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn emit(&self, level: Level, message: &str) {
        println!(
            "{} {:<5} {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
    }
}

/// Fans each message out to every backend at or below `max_level`
pub struct CompositeSink {
    sinks: Vec<Box<dyn LogSink>>,
    max_level: LevelFilter,
}

impl CompositeSink {
    pub fn new(max_level: LevelFilter) -> Self {
        Self {
            sinks: Vec::new(),
            max_level,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }
}

impl LogSink for CompositeSink {
    fn emit(&self, level: Level, message: &str) {
        if level > self.max_level {
            return;
        }
        for sink in &self.sinks {
            sink.emit(level, message);
        }
    }
}

/// Compose the daemon's sink: journal, else syslog, plus stdout in the foreground
pub fn build_sink(verbose: bool, background: bool) -> CompositeSink {
    let max_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut sink = CompositeSink::new(max_level);

    match JournalSink::connect() {
        Ok(journal) => sink = sink.with_sink(Box::new(journal)),
        Err(journal_err) => match SyslogSink::connect() {
            Ok(syslog) => sink = sink.with_sink(Box::new(syslog)),
            Err(syslog_err) => {
                eprintln!("Warning: no system log available ({}; {})", journal_err, syslog_err);
            }
        },
    }

    if !background {
        sink = sink.with_sink(Box::new(StdoutSink));
    }

    sink
}

/// Routes the `log` facade into a [`LogSink`]
struct FacadeLogger {
    sink: Arc<dyn LogSink>,
    max_level: LevelFilter,
}

impl Log for FacadeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.sink.emit(record.level(), &record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Install `sink` behind the `log` macros for host-side messages
pub fn install_facade(sink: Arc<dyn LogSink>, max_level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(FacadeLogger { sink, max_level }))?;
    log::set_max_level(max_level);
    Ok(())
}
