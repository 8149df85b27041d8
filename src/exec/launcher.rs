// src/exec/launcher.rs

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::fanout::FanOutWriter;

/// Everything needed to start one child process.
#[derive(Debug)]
pub struct LaunchRequest {
    /// Program followed by its arguments. Must not be empty.
    pub argv: Vec<String>,
    /// Variables set on top of the launcher's own environment. Values are
    /// passed through untouched; nothing expands `$` in them.
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    pub stdout: FanOutWriter,
    pub stderr: FanOutWriter,
}

/// Boxed future returned by [`ProcessHandle`] methods.
pub type HandleFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A started child process.
pub trait ProcessHandle: Send {
    /// Wait until the process has exited and its output has been fully
    /// written to the fan-out writers, yielding the exit code.
    fn wait(&mut self) -> HandleFuture<'_, i32>;

    /// Ask the process, and anything it started, to terminate.
    fn kill(&mut self) -> HandleFuture<'_, ()>;

    /// OS process id, when there is a real process behind the handle.
    fn pid(&self) -> Option<u32>;
}

/// Trait abstracting how processes are started.
///
/// Production code uses [`TokioProcessLauncher`](super::TokioProcessLauncher);
/// tests provide their own implementation that doesn't spawn real processes.
pub trait ProcessLauncher: Send + Sync {
    /// Start the process. Fails with
    /// [`DurableTaskError::LaunchFailure`](crate::errors::DurableTaskError::LaunchFailure)
    /// when it could not be started.
    fn spawn(&self, request: LaunchRequest) -> Result<Box<dyn ProcessHandle>>;
}
