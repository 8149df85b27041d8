// src/wrapper/mod.rs

//! Script wrapper generation.
//!
//! A [`ScriptWrapper`] turns the user's script into two files in the control
//! directory plus the argv that runs them:
//!
//! - the *main* script: the user's text wrapped with exit-code
//!   normalisation, so a numeric exit code is always produced;
//! - the *wrapper* script: the file the interpreter is pointed at, which
//!   sets interpreter options and dispatches to the main script.
//!
//! Interpreters differ enough that each gets its own strategy; the launcher
//! and controller never look inside the generated text.
//!
//! - [`powershell`] handles Windows PowerShell and cross-platform `pwsh`.
//! - [`posix`] handles `/bin/sh`.

use std::fmt::Debug;
use std::path::Path;

pub mod posix;
pub mod powershell;

pub use posix::PosixShellWrapper;
pub use powershell::PowershellWrapper;

/// Text of the two generated files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScripts {
    pub main_script: String,
    pub wrapper_script: String,
}

/// Interpreter-specific wrapper generation strategy.
pub trait ScriptWrapper: Send + Sync + Debug {
    /// Human readable interpreter name, used in the launch banner.
    fn display_name(&self) -> &str;

    /// File name of the main script inside the control directory.
    fn main_file_name(&self) -> &str;

    /// File name of the wrapper script inside the control directory.
    fn wrapper_file_name(&self) -> &str;

    /// Generate both scripts. `main_path` is where the main script will be
    /// written, so the wrapper can dispatch to it.
    fn generate(&self, script: &str, capture_output: bool, main_path: &Path) -> GeneratedScripts;

    /// Argument vector that runs `wrapper_path` non-interactively.
    fn command_line(&self, wrapper_path: &Path) -> Vec<String>;
}
