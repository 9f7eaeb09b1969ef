//! trenew - AFS token renewal daemon library
//!
//! Exposes the renewal loop, its interval parser and configuration models,
//! and the daemon plumbing (log sinks, PID locking) the binary wraps around them.

pub mod cli;
pub mod constants;
pub mod daemon;
pub mod duration;
pub mod models;
pub mod renewal;
