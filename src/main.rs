#![forbid(unsafe_code)]

use anyhow::Result;

fn main() -> Result<()> {
    // Interval errors surface here, before any lock is taken or loop started
    let settings = trenew::cli::parse_args()?;

    trenew::daemon::run(settings)
}
