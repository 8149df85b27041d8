// src/controller.rs

//! Polling handle over one control directory.
//!
//! A [`Controller`] is a thin view: everything it reports comes from the
//! files in the control directory, so it can be rebuilt from a bare path
//! (or a saved [`ControllerState`]) after the original one is gone. The one
//! thing that cannot be rebuilt is the [`ControllerLease`], the in-memory
//! capability to stop the process, which only the launching controller has.
//!
//! Nothing here blocks or sleeps. Callers poll:
//!
//! ```no_run
//! # async fn demo(mut c: durabletask::Controller) -> durabletask::errors::Result<()> {
//! let mut stdout = std::io::stdout();
//! let code = loop {
//!     if let Some(code) = c.exit_status()? {
//!         c.write_log(&mut stdout)?;
//!         break code;
//!     }
//!     c.write_log(&mut stdout)?;
//!     tokio::time::sleep(std::time::Duration::from_millis(250)).await;
//! };
//! c.cleanup()?;
//! # let _ = code;
//! # Ok(())
//! # }
//! ```

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::control::{ControlDir, ControlFiles};
use crate::errors::{DurableTaskError, Result};
use crate::fs::FileSystem;

/// Largest single read of the log file in [`Controller::write_log`].
pub const LOG_CHUNK: usize = 64 * 1024;

/// Where a task is in its life, as seen through the control directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// No result file yet.
    Running,
    /// Result file present with this exit code.
    Completed(i32),
    /// `cleanup` ran; the control directory is gone.
    Released,
}

/// What [`Controller::stop`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A kill request went to the live process.
    Signalled,
    /// A kill request was already sent by an earlier `stop`.
    AlreadySignalled,
    /// The process had already exited; nothing to stop.
    AlreadyExited,
    /// This controller holds no lease (it was re-attached from a path), so
    /// nothing was done. The process may well still be running.
    NoLease,
}

/// In-memory capability to stop the process this controller launched.
///
/// Never persisted: it dies with the process that created it.
#[derive(Debug)]
pub struct ControllerLease {
    stop_tx: Option<oneshot::Sender<()>>,
    supervisor: JoinHandle<()>,
    pid: Option<u32>,
}

impl ControllerLease {
    pub(crate) fn new(
        stop_tx: oneshot::Sender<()>,
        supervisor: JoinHandle<()>,
        pid: Option<u32>,
    ) -> Self {
        Self {
            stop_tx: Some(stop_tx),
            supervisor,
            pid,
        }
    }

    fn stop(&mut self) -> StopOutcome {
        if self.supervisor.is_finished() {
            return StopOutcome::AlreadyExited;
        }
        match self.stop_tx.take() {
            // A send error means the supervisor just finished on its own.
            Some(tx) => match tx.send(()) {
                Ok(()) => StopOutcome::Signalled,
                Err(()) => StopOutcome::AlreadyExited,
            },
            None => StopOutcome::AlreadySignalled,
        }
    }
}

/// Serializable part of a controller, enough to re-attach later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub control: ControlDir,
    pub capture_output: bool,
    /// Log bytes already handed to a caller.
    pub log_offset: u64,
}

/// Handle bound to one control directory.
pub struct Controller {
    fs: Arc<dyn FileSystem>,
    control: ControlDir,
    capture_output: bool,
    log_offset: u64,
    completed: Option<i32>,
    released: bool,
    lease: Option<ControllerLease>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("control", &self.control)
            .field("capture_output", &self.capture_output)
            .field("log_offset", &self.log_offset)
            .field("completed", &self.completed)
            .field("released", &self.released)
            .field("has_lease", &self.lease.is_some())
            .finish()
    }
}

impl Controller {
    pub(crate) fn launched(
        fs: Arc<dyn FileSystem>,
        control: ControlDir,
        capture_output: bool,
        lease: ControllerLease,
    ) -> Self {
        Self {
            lease: Some(lease),
            ..Self::attach(fs, control, capture_output)
        }
    }

    /// View over an existing control directory, without a lease.
    pub fn attach(fs: Arc<dyn FileSystem>, control: ControlDir, capture_output: bool) -> Self {
        Self {
            fs,
            control,
            capture_output,
            log_offset: 0,
            completed: None,
            released: false,
            lease: None,
        }
    }

    /// Convenience for [`Controller::attach`] from a directory path.
    pub fn attach_path(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        files: ControlFiles,
        capture_output: bool,
    ) -> Self {
        Self::attach(fs, ControlDir::new(path.as_ref(), files), capture_output)
    }

    pub fn from_state(fs: Arc<dyn FileSystem>, state: ControllerState) -> Self {
        Self {
            log_offset: state.log_offset,
            ..Self::attach(fs, state.control, state.capture_output)
        }
    }

    pub fn state(&self) -> ControllerState {
        ControllerState {
            control: self.control.clone(),
            capture_output: self.capture_output,
            log_offset: self.log_offset,
        }
    }

    pub fn control_dir(&self) -> &ControlDir {
        &self.control
    }

    pub fn is_capturing_output(&self) -> bool {
        self.capture_output
    }

    pub fn has_lease(&self) -> bool {
        self.lease.is_some()
    }

    /// OS id of the launched process. Only known to the launching controller.
    pub fn pid(&self) -> Option<u32> {
        self.lease.as_ref().and_then(|lease| lease.pid)
    }

    /// Exit code if the process has finished, `None` while it runs.
    ///
    /// One probe of the result file per call, no waiting.
    pub fn exit_status(&mut self) -> Result<Option<i32>> {
        self.ensure_live()?;
        if let Some(code) = self.completed {
            return Ok(Some(code));
        }
        let status = self.control.read_result(self.fs.as_ref())?;
        if let Some(code) = status {
            debug!(control_dir = %self.control.path().display(), exit_code = code, "task completed");
            self.completed = Some(code);
        }
        Ok(status)
    }

    pub fn task_state(&mut self) -> Result<TaskState> {
        if self.released {
            return Ok(TaskState::Released);
        }
        Ok(match self.exit_status()? {
            Some(code) => TaskState::Completed(code),
            None => TaskState::Running,
        })
    }

    /// Copy log bytes not yet delivered into `sink`; returns how many.
    ///
    /// Only what is in the file right now is copied, [`LOG_CHUNK`] bytes at
    /// a time. If `sink` fails, the failed chunk and everything after it is
    /// offered again on the next call.
    pub fn write_log(&mut self, sink: &mut dyn Write) -> Result<u64> {
        self.ensure_live()?;
        let path = self.control.log_file();
        let mut copied = 0;

        loop {
            let chunk = self.fs.read_from(&path, self.log_offset, LOG_CHUNK)?;
            if chunk.is_empty() {
                break;
            }
            sink.write_all(&chunk)?;

            let n = chunk.len() as u64;
            self.log_offset += n;
            copied += n;
            if chunk.len() < LOG_CHUNK {
                break;
            }
        }

        if copied > 0 {
            sink.flush()?;
        }
        Ok(copied)
    }

    /// The captured standard output, in full.
    pub fn get_output(&self) -> Result<Vec<u8>> {
        if !self.capture_output {
            return Err(DurableTaskError::NotCaptured);
        }
        self.ensure_live()?;
        let path = self.control.output_file();
        self.fs.read_if_exists(&path)?.ok_or_else(|| {
            DurableTaskError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("output file {:?} is missing", path),
            ))
        })
    }

    /// Best-effort stop through the lease, if this controller has one.
    pub fn stop(&mut self) -> StopOutcome {
        let outcome = match self.lease.as_mut() {
            Some(lease) => lease.stop(),
            None => StopOutcome::NoLease,
        };
        info!(control_dir = %self.control.path().display(), ?outcome, "stop");
        outcome
    }

    /// Remove the control directory. Safe to call any number of times.
    ///
    /// Does not wait for the process: if it is still running it carries on
    /// until it exits or is stopped.
    pub fn cleanup(&mut self) -> Result<()> {
        let path = self.control.path();
        self.fs
            .remove_dir_all(path)
            .map_err(|source| DurableTaskError::Cleanup {
                path: path.to_path_buf(),
                source,
            })?;
        if !self.released {
            info!(control_dir = %path.display(), "control directory removed");
        }
        self.released = true;
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(DurableTaskError::Released(self.control.path().to_path_buf()));
        }
        Ok(())
    }
}
