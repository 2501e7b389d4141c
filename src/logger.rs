//! Logging setup: one tracing-subscriber writing to stderr.
//!
//! A bare level such as `debug` applies to ragbot's own targets only; the
//! HTTP and Telegram stacks underneath stay at `warn` so request-level noise
//! from hyper or teloxide does not drown the mediator's dispatch lines.
//! Anything that already looks like a filter directive (`=` or `,`) is used
//! as given.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

const DEPENDENCY_LEVEL: &str = "warn";

/// Expand a configured level into the filter directive actually installed.
pub fn directive(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("{DEPENDENCY_LEVEL},{}={level}", env!("CARGO_CRATE_NAME"))
    }
}

/// Install the global subscriber and return the directive it filters with.
///
/// With `prefer_level` (a `-v` flag was given) `level` wins and `RUST_LOG` is
/// only consulted when `level` does not parse. Otherwise `RUST_LOG` wins and
/// `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<String, AppError> {
    let from_level = directive(level);
    let filter = if prefer_level {
        match EnvFilter::try_new(&from_level) {
            Ok(filter) => filter,
            Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            })?,
        }
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&from_level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?
    };
    let installed = filter.to_string();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(installed)
}
