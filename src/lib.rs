// src/lib.rs

//! Durable script execution.
//!
//! A script is started in the background and everything about it (its log,
//! its optional captured output, its exit code) is written into a control
//! directory on disk. A [`Controller`] reads those files back, so the caller
//! can disconnect, restart, or re-attach from a bare path and still find
//! out how the script went.

pub mod cli;
pub mod config;
pub mod control;
pub mod controller;
pub mod errors;
pub mod exec;
pub mod fanout;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod task;
pub mod types;
pub mod wrapper;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{load_or_default, Config};
use crate::exec::TokioProcessLauncher;
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::TaskRegistry;

pub use crate::control::{ControlDir, ControlFiles};
pub use crate::controller::{Controller, ControllerState, StopOutcome, TaskState};
pub use crate::fanout::FanOutWriter;
pub use crate::task::ScriptTask;

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(&args.config)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    match args.command {
        Command::Run {
            kind,
            capture,
            workspace,
            env,
            script,
        } => {
            let registry = TaskRegistry::with_defaults(&cfg);
            let mut task = registry.create(&kind, script)?;
            if capture {
                task.capture_output();
            }
            let workspace = workspace.unwrap_or_else(|| cfg.workspace().to_path_buf());
            let env: BTreeMap<String, String> = env.into_iter().collect();
            run_to_completion(&task, &env, workspace, fs, &cfg).await
        }
        Command::Status { dir } => {
            let mut controller = reattach(fs, dir, &cfg);
            match controller.exit_status()? {
                Some(code) => println!("{code}"),
                None => println!("running"),
            }
            Ok(0)
        }
        Command::Log { dir } => {
            let mut controller = reattach(fs, dir, &cfg);
            controller.write_log(&mut io::stdout())?;
            Ok(0)
        }
        Command::Cleanup { dir } => {
            reattach(fs, dir, &cfg).cleanup()?;
            Ok(0)
        }
    }
}

fn reattach(fs: Arc<dyn FileSystem>, dir: PathBuf, cfg: &Config) -> Controller {
    Controller::attach_path(fs, dir, cfg.files().clone(), false)
}

/// Launch, follow the log until a result appears, print captured output,
/// and always clean up.
///
/// In capture mode the log goes to stderr so stdout carries only the
/// captured output.
async fn run_to_completion(
    task: &ScriptTask,
    env: &BTreeMap<String, String>,
    workspace: PathBuf,
    fs: Arc<dyn FileSystem>,
    cfg: &Config,
) -> Result<i32> {
    let capture = task.is_capturing_output();
    let mut controller = task.launch(env, &workspace, fs, &TokioProcessLauncher, &mut io::stderr())?;

    let mut log_sink: Box<dyn Write> = if capture {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };

    let outcome = match follow(&mut controller, log_sink.as_mut(), cfg.poll_interval()).await {
        Ok(code) if capture => print_output(&controller).map(|()| code),
        other => other,
    };

    // A failed cleanup is reported but never hides the exit code.
    if let Err(e) = controller.cleanup() {
        error!(error = %e, "cleanup failed");
    }

    outcome
}

fn print_output(controller: &Controller) -> Result<()> {
    let bytes = controller.get_output()?;
    let mut stdout = io::stdout();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}

/// Poll loop: probe the result, drain the log, sleep. Ctrl-C stops the task
/// and keeps polling until the result shows up.
async fn follow(controller: &mut Controller, sink: &mut dyn Write, interval: Duration) -> Result<i32> {
    loop {
        if let Some(code) = controller.exit_status()? {
            controller.write_log(sink)?;
            return Ok(code);
        }
        controller.write_log(sink)?;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    let outcome = controller.stop();
                    warn!(?outcome, "interrupted; stopping task");
                }
            }
        }
    }
}
