// src/errors.rs

//! Crate-wide error type and `Result` alias.
//!
//! Script-level failures never show up here: they are already folded into
//! the numeric exit code in the result file. What remains is I/O on the
//! control directory, process start-up and configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DurableTaskError {
    /// The external process could not be started. No controller exists.
    #[error("Launch failure: {0}")]
    LaunchFailure(String),

    /// A sink inside a fan-out writer failed; later sinks were not written
    /// for that call under the fail-fast policy.
    #[error("Stream failure on sink #{sink}: {source}")]
    Stream {
        sink: usize,
        #[source]
        source: std::io::Error,
    },

    /// The result file exists but does not hold a decimal exit code.
    #[error("Protocol violation: result file {path:?} holds {content:?}, not an exit code")]
    ProtocolViolation { path: PathBuf, content: String },

    #[error("Output was not captured for this task (capture mode was off at launch)")]
    NotCaptured,

    #[error("Cleanup of {path:?} failed: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The controller already removed its control directory.
    #[error("Control directory {0:?} was already cleaned up")]
    Released(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DurableTaskError>;
