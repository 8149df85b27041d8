// src/exec/supervisor.rs

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::control::ControlDir;
use crate::fs::FileSystem;

use super::launcher::ProcessHandle;

/// Wait for the process, then record its exit code in the result file.
///
/// - If the stop channel fires, the process is killed and the code it then
///   exits with is recorded.
/// - If the stop channel is dropped (the controller went away), the process
///   is left alone and still gets its result written when it exits.
/// - If the control directory was cleaned up in the meantime, the result is
///   dropped with a warning; the directory is not recreated.
pub async fn supervise(
    mut handle: Box<dyn ProcessHandle>,
    mut stop_rx: oneshot::Receiver<()>,
    control: ControlDir,
    fs: Arc<dyn FileSystem>,
) {
    let dir = control.path().display().to_string();

    let waited = tokio::select! {
        res = handle.wait() => res,

        stop = &mut stop_rx => {
            match stop {
                Ok(()) => {
                    info!(control_dir = %dir, "stop requested; killing process");
                    if let Err(e) = handle.kill().await {
                        warn!(control_dir = %dir, error = %e, "failed to kill process");
                    }
                }
                Err(_) => {
                    debug!(control_dir = %dir, "controller dropped; process keeps running");
                }
            }
            handle.wait().await
        }
    };

    let code = match waited {
        Ok(code) => code,
        Err(e) => {
            error!(control_dir = %dir, error = %e, "lost track of process; recording -1");
            -1
        }
    };

    info!(control_dir = %dir, exit_code = code, "process exited");

    if let Err(e) = control.write_result(fs.as_ref(), code) {
        warn!(control_dir = %dir, error = %e, "could not write result file");
    }
}
