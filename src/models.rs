//! Data models module
//!
//! Defines the resolved configuration snapshots:
//! - RenewalConfig: everything the renewal loop needs, immutable for its lifetime
//! - DaemonOptions: process lifecycle options consumed by the host wrapper
//! - Settings: the two together, as produced by the CLI

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration owned by the renewal loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalConfig {
    /// Path to the renewal executable (aklog)
    pub renewal_command: PathBuf,
    /// Extra arguments appended after the debug flag
    pub renewal_args: Vec<String>,
    /// Sleep after a successful renewal
    #[serde(with = "seconds")]
    pub keep_alive_interval: Duration,
    /// Sleep after a failed renewal; zero retries without delay
    #[serde(with = "seconds")]
    pub obsess_interval: Duration,
    /// Terminate when the renewal command cannot be launched
    pub fail_fast: bool,
    /// Debug-level logging
    pub verbose: bool,
}

impl RenewalConfig {
    /// Split a single options string into renewal arguments.
    ///
    /// An empty or blank string yields no arguments.
    pub fn split_options(options: &str) -> Vec<String> {
        options.split_whitespace().map(str::to_string).collect()
    }
}

/// Process lifecycle options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonOptions {
    /// Advisory lock file preventing duplicate instances
    pub pid_file: PathBuf,
    /// Detach from the controlling terminal
    pub background: bool,
}

/// Fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub renewal: RenewalConfig,
    pub daemon: DaemonOptions,
}

/// Serialize intervals as whole seconds in debug records
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
