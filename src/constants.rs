//! Global constants for trenew
//!
//! Centralized location for application-wide constants

/// Identifier used for the journal, syslog and the PID file name
pub const APP_NAME: &str = "trenew";

/// PID file name placed in the per-user runtime directory
pub const PID_FILE_NAME: &str = "trenew.pid";

/// Default renewal executable
pub const DEFAULT_AKLOG_PATH: &str = "/usr/bin/aklog";

/// Flag passed to the renewal command so its output is worth logging
pub const AKLOG_DEBUG_FLAG: &str = "-d";

/// Default steady-state interval after a successful renewal
pub const DEFAULT_KEEP_ALIVE: &str = "5m";

/// Default fast-retry interval after a failed renewal
pub const DEFAULT_OBSESS: &str = "1m";

/// Accepted for compatibility, never acted on
pub const DEFAULT_HOW_MANY: &str = "1h";

/// Socket the systemd journal listens on; its presence means the journal is usable
pub const JOURNAL_SOCKET_PATH: &str = "/run/systemd/journal/socket";

/// File mode creation mask applied to the daemon process
pub const DAEMON_UMASK: u32 = 0o002;
