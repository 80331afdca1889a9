//! Diagnostic logging to stderr via `tracing-subscriber`.
//!
//! `RUST_LOG` wins when set. Otherwise the level comes from `-v`:
//! warn by default, then info, debug and trace. `--quiet` drops to error.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

pub(crate) fn level_for(verbosity: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Dependencies stay at warn.
        EnvFilter::new(format!(
            "warn,dynform={level},dynform_cli={level},dynform_engine={level},dynform_schema={level}",
            level = level.as_str().to_lowercase()
        ))
    })
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub(crate) fn init_logging(verbosity: u8, quiet: bool) {
    let filter = build_env_filter(level_for(verbosity, quiet));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .without_time()
        .try_init();
}
