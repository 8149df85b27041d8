// src/exec/process.rs

//! `tokio::process` implementation of [`ProcessLauncher`].

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{DurableTaskError, Result};
use crate::fanout::FanOutWriter;

use super::launcher::{HandleFuture, LaunchRequest, ProcessHandle, ProcessLauncher};

const PUMP_BUFFER: usize = 8 * 1024;

/// Starts real OS processes. Must be used from inside a Tokio runtime.
///
/// The child is not killed when its handle is dropped: it keeps running
/// until it exits or someone calls [`ProcessHandle::kill`].
///
/// On unix the child leads its own process group, and `kill` signals the
/// whole group, so commands started by the script die with it.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher;

impl ProcessLauncher for TokioProcessLauncher {
    fn spawn(&self, request: LaunchRequest) -> Result<Box<dyn ProcessHandle>> {
        let LaunchRequest {
            argv,
            env,
            cwd,
            stdout,
            stderr,
        } = request;

        let Some((program, args)) = argv.split_first() else {
            return Err(DurableTaskError::LaunchFailure(
                "empty argument vector".to_string(),
            ));
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DurableTaskError::LaunchFailure(
                "no Tokio runtime to drive the process".to_string(),
            ));
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&env)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            DurableTaskError::LaunchFailure(format!("spawning {program:?} in {cwd:?}: {e}"))
        })?;

        let pid = child.id();
        info!(pid, program = %program, "process started");

        let mut pumps = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(out, stdout, "stdout")));
        }
        if let Some(err) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(err, stderr, "stderr")));
        }

        Ok(Box::new(TokioProcessHandle { child, pid, pumps }))
    }
}

struct TokioProcessHandle {
    child: Child,
    /// Also the process group id on unix. Kept after the child is reaped,
    /// since background commands may still hold the pipes open.
    pid: Option<u32>,
    pumps: Vec<JoinHandle<()>>,
}

impl ProcessHandle for TokioProcessHandle {
    fn wait(&mut self) -> HandleFuture<'_, i32> {
        Box::pin(async move {
            let status = self.child.wait().await.context("waiting for process")?;

            // Output is only complete once both pipes hit EOF. A pump is
            // removed only after it finished, so a wait cancelled here can
            // be resumed by the next one.
            while let Some(pump) = self.pumps.first_mut() {
                if let Err(e) = pump.await {
                    warn!(error = %e, "output pump task failed");
                }
                self.pumps.remove(0);
            }

            Ok(status.code().unwrap_or(-1))
        })
    }

    fn kill(&mut self) -> HandleFuture<'_, ()> {
        Box::pin(async move {
            #[cfg(unix)]
            if let Some(pid) = self.pid {
                return kill_group(pid);
            }
            if self.child.id().is_some() {
                self.child.kill().await.context("killing process")?;
            }
            Ok(())
        })
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// SIGKILL every process in the group led by `pid`. A group that is already
/// gone counts as killed.
#[cfg(unix)]
fn kill_group(pid: u32) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .map_err(|_| DurableTaskError::Other(anyhow::anyhow!("pid {pid} out of range")))?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => {
            debug!(pgid, "process group killed");
            Ok(())
        }
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(anyhow::Error::from(e)
            .context(format!("killing process group {pgid}"))
            .into()),
    }
}

/// Copy one child pipe into a fan-out writer until EOF.
///
/// After a sink failure the pipe is still drained, so the child never
/// blocks on a full pipe.
async fn pump<R>(mut reader: R, mut sink: FanOutWriter, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER];
    let mut healthy = true;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(stream, error = %e, "reading child pipe failed");
                break;
            }
        };

        if healthy {
            if let Err(e) = sink.write_chunk(&buf[..n]).and_then(|()| sink.flush_all()) {
                warn!(stream, error = %e, "fan-out write failed; discarding further output");
                healthy = false;
            }
        }
    }

    if let Err(e) = sink.close() {
        warn!(stream, error = %e, "closing fan-out sinks failed");
    }
    debug!(stream, "pipe drained");
}
