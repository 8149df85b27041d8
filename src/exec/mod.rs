// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`launcher`] defines the seam to whatever actually starts processes:
//!   [`ProcessLauncher`] takes argv, environment, working directory and two
//!   fan-out writers, and returns a [`ProcessHandle`] that can be waited on
//!   or killed.
//! - [`process`] is the production implementation on `tokio::process`.
//! - [`supervisor`] waits for the process (or a stop request) and writes
//!   the result file once the process is gone.
//!
//! Tests swap in a fake launcher that never spawns an OS process.

pub mod launcher;
pub mod process;
pub mod supervisor;

pub use launcher::{LaunchRequest, ProcessHandle, ProcessLauncher};
pub use process::TokioProcessLauncher;
