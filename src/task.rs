// src/task.rs

//! A script to run durably, and the launch sequence that starts it.
//!
//! `launch` does, in order:
//! 1. pick a fresh control directory next to the workspace;
//! 2. write the main and wrapper scripts produced by the task's
//!    [`ScriptWrapper`];
//! 3. wire stdout and stderr through one [`FanOutWriter`] each into the
//!    `log` file (and, in capture mode, the `output` file);
//! 4. start the process and hand it to a supervisor task that writes the
//!    result file when the process is gone;
//! 5. return a [`Controller`] holding the stop lease.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::control::{ControlDir, ControlFiles};
use crate::controller::{Controller, ControllerLease};
use crate::errors::{DurableTaskError, Result};
use crate::exec::supervisor::supervise;
use crate::exec::{LaunchRequest, ProcessLauncher};
use crate::fanout::FanOutWriter;
use crate::fs::FileSystem;
use crate::types::{ExecutionTarget, FanOutPolicy};
use crate::wrapper::{PosixShellWrapper, PowershellWrapper, ScriptWrapper};

const MAX_DIR_ATTEMPTS: usize = 8;

/// An immutable script plus the capture flag, ready to launch.
#[derive(Debug, Clone)]
pub struct ScriptTask {
    script: String,
    capture_output: bool,
    wrapper: Arc<dyn ScriptWrapper>,
    files: ControlFiles,
    fan_out_policy: FanOutPolicy,
}

impl ScriptTask {
    pub fn new(script: impl Into<String>, wrapper: Arc<dyn ScriptWrapper>) -> Self {
        Self {
            script: script.into(),
            capture_output: false,
            wrapper,
            files: ControlFiles::default(),
            fan_out_policy: FanOutPolicy::default(),
        }
    }

    /// PowerShell task for the current host.
    pub fn powershell(script: impl Into<String>) -> Self {
        Self::new(script, Arc::new(PowershellWrapper::new(ExecutionTarget::host())))
    }

    /// `/bin/sh` task.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new(script, Arc::new(PosixShellWrapper::new()))
    }

    pub fn with_files(mut self, files: ControlFiles) -> Self {
        self.files = files;
        self
    }

    pub fn with_fan_out_policy(mut self, policy: FanOutPolicy) -> Self {
        self.fan_out_policy = policy;
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn display_name(&self) -> &str {
        self.wrapper.display_name()
    }

    /// Record stdout separately so it can be read back with
    /// [`Controller::get_output`]. Only affects later launches.
    pub fn capture_output(&mut self) {
        self.capture_output = true;
    }

    pub fn is_capturing_output(&self) -> bool {
        self.capture_output
    }

    /// Start the script under `workspace`.
    ///
    /// `listener` receives a one-line banner naming the control directory.
    /// Must be called from inside a Tokio runtime. On error no process is
    /// running and no control directory is left behind.
    pub fn launch(
        &self,
        env: &BTreeMap<String, String>,
        workspace: &Path,
        fs: Arc<dyn FileSystem>,
        launcher: &dyn ProcessLauncher,
        listener: &mut dyn Write,
    ) -> Result<Controller> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            DurableTaskError::LaunchFailure("launch needs a Tokio runtime".to_string())
        })?;

        fs.create_dir_all(workspace).map_err(|e| launch_failure("creating workspace", e.into()))?;
        let control = self.fresh_control_dir(fs.as_ref(), workspace)?;
        fs.create_dir_all(control.path())
            .map_err(|e| launch_failure("creating control directory", e.into()))?;

        let request = match self.prepare(&control, env, workspace, fs.as_ref()) {
            Ok(request) => request,
            Err(e) => return Err(abandon(fs.as_ref(), &control, launch_failure("writing scripts", e))),
        };

        if let Err(e) = writeln!(
            listener,
            "[{}] Running {} script",
            control.name(),
            self.wrapper.display_name()
        ) {
            return Err(abandon(fs.as_ref(), &control, e.into()));
        }

        let handle = match launcher.spawn(request) {
            Ok(handle) => handle,
            Err(e) => return Err(abandon(fs.as_ref(), &control, launch_failure("starting process", e))),
        };

        info!(
            control_dir = %control.path().display(),
            pid = handle.pid(),
            kind = self.wrapper.display_name(),
            capture = self.capture_output,
            "task launched"
        );

        let pid = handle.pid();
        let (stop_tx, stop_rx) = oneshot::channel();
        let supervisor = runtime.spawn(supervise(handle, stop_rx, control.clone(), Arc::clone(&fs)));

        Ok(Controller::launched(
            fs,
            control,
            self.capture_output,
            ControllerLease::new(stop_tx, supervisor, pid),
        ))
    }

    fn fresh_control_dir(&self, fs: &dyn FileSystem, workspace: &Path) -> Result<ControlDir> {
        for _ in 0..MAX_DIR_ATTEMPTS {
            let control = ControlDir::generate(workspace, self.files.clone());
            if !fs.exists(control.path()) {
                return Ok(control);
            }
        }
        Err(DurableTaskError::LaunchFailure(format!(
            "no free control directory next to {:?}",
            workspace
        )))
    }

    /// Write the scripts and open every sink the child's streams go to.
    fn prepare(
        &self,
        control: &ControlDir,
        env: &BTreeMap<String, String>,
        workspace: &Path,
        fs: &dyn FileSystem,
    ) -> Result<LaunchRequest> {
        let main_path = control.child(self.wrapper.main_file_name());
        let wrapper_path = control.child(self.wrapper.wrapper_file_name());

        let scripts = self
            .wrapper
            .generate(&self.script, self.capture_output, &main_path);
        fs.write(&main_path, scripts.main_script.as_bytes())?;
        fs.write(&wrapper_path, scripts.wrapper_script.as_bytes())?;

        let log = control.log_file();
        fs.write(&log, b"")?;

        // Every sink is an append handle, so two writers on one file never
        // overwrite each other's bytes.
        let (stdout_sinks, stderr_sinks) = if self.capture_output {
            let output = control.output_file();
            fs.write(&output, b"")?;
            (
                vec![fs.open_append(&output)?, fs.open_append(&log)?],
                vec![fs.open_append(&output)?, fs.open_append(&log)?],
            )
        } else {
            (vec![fs.open_append(&log)?], vec![fs.open_append(&log)?])
        };

        Ok(LaunchRequest {
            argv: self.wrapper.command_line(&wrapper_path),
            env: env.clone(),
            cwd: workspace.to_path_buf(),
            stdout: FanOutWriter::new(stdout_sinks, self.fan_out_policy),
            stderr: FanOutWriter::new(stderr_sinks, self.fan_out_policy),
        })
    }
}

fn launch_failure(what: &str, err: DurableTaskError) -> DurableTaskError {
    match err {
        DurableTaskError::LaunchFailure(_) => err,
        other => DurableTaskError::LaunchFailure(format!("{what}: {other}")),
    }
}

/// Remove a half-built control directory and pass the original error on.
fn abandon(fs: &dyn FileSystem, control: &ControlDir, err: DurableTaskError) -> DurableTaskError {
    if let Err(e) = fs.remove_dir_all(control.path()) {
        warn!(
            control_dir = %control.path().display(),
            error = %e,
            "could not remove control directory after failed launch"
        );
    }
    err
}
