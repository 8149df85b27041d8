use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use durabletask::errors::{DurableTaskError, Result};
use durabletask::exec::launcher::HandleFuture;
use durabletask::exec::{LaunchRequest, ProcessHandle, ProcessLauncher};
use durabletask::FanOutWriter;

/// Exit code a fake process reports after being killed.
pub const KILLED_EXIT_CODE: i32 = 143;

/// What a fake process does once started.
#[derive(Debug, Clone, Default)]
pub struct FakeBehaviour {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    /// When set, the process keeps "running" until the gate is notified or
    /// it is killed.
    pub gate: Option<Arc<Notify>>,
    pub fail_to_start: bool,
}

impl FakeBehaviour {
    pub fn exits(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Default::default()
        }
    }

    pub fn stdout(mut self, bytes: &[u8]) -> Self {
        self.stdout = bytes.to_vec();
        self
    }

    pub fn stderr(mut self, bytes: &[u8]) -> Self {
        self.stderr = bytes.to_vec();
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_to_start() -> Self {
        Self {
            fail_to_start: true,
            ..Default::default()
        }
    }
}

/// A launch as the fake saw it.
#[derive(Debug, Clone)]
pub struct RecordedLaunch {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

/// A launcher that:
/// - records every launch request
/// - "runs" each process by writing canned stdout/stderr into the fan-out
///   writers and reporting a canned exit code.
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    behaviour: FakeBehaviour,
    launches: Arc<Mutex<Vec<RecordedLaunch>>>,
}

impl FakeLauncher {
    pub fn new(behaviour: FakeBehaviour) -> Self {
        Self {
            behaviour,
            launches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().unwrap().clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn spawn(&self, request: LaunchRequest) -> Result<Box<dyn ProcessHandle>> {
        if self.behaviour.fail_to_start {
            return Err(DurableTaskError::LaunchFailure(format!(
                "fake launcher refused to start {:?}",
                request.argv
            )));
        }

        self.launches.lock().unwrap().push(RecordedLaunch {
            argv: request.argv.clone(),
            env: request.env.clone(),
            cwd: request.cwd.clone(),
        });

        Ok(Box::new(FakeHandle {
            stdout: Some(request.stdout),
            stderr: Some(request.stderr),
            behaviour: self.behaviour.clone(),
            kill: Arc::new(Notify::new()),
            killed: false,
        }))
    }
}

struct FakeHandle {
    stdout: Option<FanOutWriter>,
    stderr: Option<FanOutWriter>,
    behaviour: FakeBehaviour,
    kill: Arc<Notify>,
    killed: bool,
}

impl FakeHandle {
    fn emit(&mut self) -> Result<()> {
        if let Some(mut out) = self.stdout.take() {
            out.write_chunk(&self.behaviour.stdout)?;
            out.close()?;
        }
        if let Some(mut err) = self.stderr.take() {
            err.write_chunk(&self.behaviour.stderr)?;
            err.close()?;
        }
        Ok(())
    }
}

impl ProcessHandle for FakeHandle {
    fn wait(&mut self) -> HandleFuture<'_, i32> {
        Box::pin(async move {
            self.emit()?;

            if let Some(gate) = self.behaviour.gate.clone() {
                if !self.killed {
                    let kill = Arc::clone(&self.kill);
                    tokio::select! {
                        _ = gate.notified() => {}
                        _ = kill.notified() => self.killed = true,
                    }
                }
            }

            Ok(if self.killed {
                KILLED_EXIT_CODE
            } else {
                self.behaviour.exit_code
            })
        })
    }

    fn kill(&mut self) -> HandleFuture<'_, ()> {
        Box::pin(async move {
            self.killed = true;
            self.kill.notify_one();
            Ok(())
        })
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}
