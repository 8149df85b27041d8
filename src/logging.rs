// src/logging.rs

//! Logging setup for `durabletask` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `DURABLETASK_LOG` environment variable: either a bare level ("debug")
//!    or full `EnvFilter` directives ("durabletask::exec=trace,warn")
//! 3. default to `info`
//!
//! A bare level only applies to this crate's targets; everything else stays
//! at `warn`. Logs go to STDERR; stdout carries the task log and captured
//! output.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "DURABLETASK_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let directives = filter_directives(cli_level, env_value.as_deref());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid {LOG_ENV_VAR} filter: {directives}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Filter directives for the given CLI flag and env value.
fn filter_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return crate_directives(level_from_log_level(lvl));
    }
    match env_value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => match parse_level_str(value) {
            Some(level) => crate_directives(level),
            None => value.to_string(),
        },
        None => crate_directives(Level::INFO),
    }
}

fn crate_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("warn,{}={level}", env!("CARGO_CRATE_NAME"))
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_level_strings() {
        assert_eq!(parse_level_str(" Warning "), Some(Level::WARN));
        assert_eq!(parse_level_str("trace"), Some(Level::TRACE));
        assert_eq!(parse_level_str("loud"), None);
    }

    #[test]
    fn bare_levels_are_scoped_to_this_crate() {
        assert_eq!(filter_directives(None, None), "warn,durabletask=info");
        assert_eq!(filter_directives(None, Some("debug")), "warn,durabletask=debug");
        assert_eq!(
            filter_directives(Some(LogLevel::Trace), Some("error")),
            "warn,durabletask=trace"
        );
    }

    #[test]
    fn full_directives_pass_through() {
        let directives = filter_directives(None, Some("durabletask::exec=trace,info"));
        assert_eq!(directives, "durabletask::exec=trace,info");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
