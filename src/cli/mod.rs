//! CLI argument parsing and validation module
//!
//! Handles the command-line interface using clap, including:
//! - Renewal command path and options
//! - Keep-alive and obsess intervals (validated before the daemon starts)
//! - PID file location and backgrounding
//! - Compatibility flags accepted but not acted on

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use crate::constants::{
    APP_NAME, DEFAULT_AKLOG_PATH, DEFAULT_HOW_MANY, DEFAULT_KEEP_ALIVE, DEFAULT_OBSESS,
    PID_FILE_NAME,
};
use crate::duration::parse_duration;
use crate::models::{DaemonOptions, RenewalConfig, Settings};

const VERSION: &str = concat!(env!("TRENEW_VERSION"), " (", env!("GIT_HASH"), ")");

fn command() -> Command {
    Command::new(APP_NAME)
        .version(VERSION)
        .about("Keep AFS tokens fresh by running aklog periodically")
        .long_about(
            "Runs aklog every keep-alive interval to keep AFS tokens valid. \
             When aklog fails, retries every obsess interval until it succeeds again.\n\n\
             Intervals take an integer with an optional unit: s, m, h or d (e.g. 30s). \
             A bare integer is minutes.",
        )
        .arg(
            Arg::new("pid-file")
                .short('c')
                .long("pid-file")
                .value_name("PATH")
                .help("Path to pid file [default: $XDG_RUNTIME_DIR/trenew.pid]"),
        )
        .arg(
            Arg::new("background")
                .short('b')
                .long("background")
                .help("Fork and run in the background")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("exit-immediately")
                .short('x')
                .long("exit-immediately")
                .help("Exit immediately if aklog cannot be run")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("keep-alive")
                .short('K')
                .long("keep-alive")
                .value_name("INTERVAL")
                .default_value(DEFAULT_KEEP_ALIVE)
                .help("Renew the token every INTERVAL, e.g. 30s, 5m, 1h, 1d"),
        )
        .arg(
            Arg::new("how-many")
                .short('H')
                .long("how-many")
                .value_name("INTERVAL")
                .default_value(DEFAULT_HOW_MANY)
                .help("Accepted for compatibility; token lifetime is not checked"),
        )
        .arg(
            Arg::new("token")
                .short('t')
                .long("token")
                .value_name("VALUE")
                .help("Accepted for compatibility; has no effect"),
        )
        .arg(
            Arg::new("aklog-path")
                .long("aklog-path")
                .value_name("PATH")
                .default_value(DEFAULT_AKLOG_PATH)
                .help("Path to aklog"),
        )
        .arg(
            Arg::new("aklog-options")
                .short('o')
                .long("aklog-options")
                .value_name("OPTIONS")
                .default_value("")
                .allow_hyphen_values(true)
                .help("Options to pass to aklog, as one string"),
        )
        .arg(
            Arg::new("obsess")
                .short('O')
                .long("obsess")
                .value_name("INTERVAL")
                .default_value(DEFAULT_OBSESS)
                .help("After a failure, retry every INTERVAL until aklog succeeds; 0 retries without delay"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging; also echoed to stdout when not backgrounded")
                .action(ArgAction::SetTrue),
        )
}

/// Parse command line arguments and return configuration
pub fn parse_args() -> Result<Settings> {
    parse_args_from(std::env::args_os())
}

/// Parse an explicit argument list (first item is the program name).
///
/// `--help`, `--version` and usage errors exit the process the way clap does.
pub fn parse_args_from<I, T>(args: I) -> Result<Settings>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().get_matches_from(args);
    resolve(&matches)
}

fn resolve(matches: &ArgMatches) -> Result<Settings> {
    let keep_alive_interval = interval(matches, "keep-alive")?;
    let obsess_interval = interval(matches, "obsess")?;
    // Validated like the other intervals even though nothing consumes it
    interval(matches, "how-many")?;

    let renewal_command = absolute(Path::new(string(matches, "aklog-path")), true)?;
    let renewal_args = RenewalConfig::split_options(string(matches, "aklog-options"));

    let pid_file = match matches.get_one::<String>("pid-file") {
        Some(path) => absolute(Path::new(path), false)?,
        None => default_pid_file(),
    };

    Ok(Settings {
        renewal: RenewalConfig {
            renewal_command,
            renewal_args,
            keep_alive_interval,
            obsess_interval,
            fail_fast: matches.get_flag("exit-immediately"),
            verbose: matches.get_flag("verbose"),
        },
        daemon: DaemonOptions {
            pid_file,
            background: matches.get_flag("background"),
        },
    })
}

fn string<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches.get_one::<String>(id).map(String::as_str).unwrap_or_default()
}

fn interval(matches: &ArgMatches, id: &str) -> Result<Duration> {
    let value = string(matches, id);
    parse_duration(value).with_context(|| format!("Invalid --{} value '{}'", id, value))
}

/// The daemon changes directory to $HOME, so relative paths are pinned first.
///
/// With `only_with_separator`, a bare name like `aklog` is left for `$PATH` lookup.
fn absolute(path: &Path, only_with_separator: bool) -> Result<PathBuf> {
    if path.is_absolute() || (only_with_separator && path.components().count() == 1) {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

/// `$XDG_RUNTIME_DIR/trenew.pid`, else `/var/run/user/<uid>/trenew.pid`
pub fn default_pid_file() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| {
            PathBuf::from(format!("/var/run/user/{}", nix::unistd::getuid()))
        })
        .join(PID_FILE_NAME)
}
