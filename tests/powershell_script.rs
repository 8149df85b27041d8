// tests/powershell_script.rs

//! End-to-end runs through a real PowerShell. Each test returns early when
//! neither `pwsh` nor `powershell` is on `PATH`.

mod common;
use crate::common::{env, find_on_path, init_tracing, poll_until_done, trim_line_terminator};

use std::sync::Arc;
use std::time::Duration;

use durabletask::exec::TokioProcessLauncher;
use durabletask::fs::RealFileSystem;
use durabletask::types::ExecutionTarget;
use durabletask::wrapper::PowershellWrapper;
use durabletask::{Controller, ScriptTask};

const TIMEOUT: Duration = Duration::from_secs(60);

fn powershell() -> Option<PowershellWrapper> {
    let candidates: &[&str] = if cfg!(windows) {
        &["pwsh.exe", "powershell.exe"]
    } else {
        &["pwsh", "powershell"]
    };
    let program = candidates.iter().find(|p| find_on_path(p).is_some())?;
    Some(PowershellWrapper::with_program(*program, ExecutionTarget::host()))
}

fn task(script: &str) -> Option<ScriptTask> {
    match powershell() {
        Some(wrapper) => Some(ScriptTask::new(script, Arc::new(wrapper))),
        None => {
            eprintln!("skipping: PowerShell is not on PATH");
            None
        }
    }
}

struct Finished {
    controller: Controller,
    code: i32,
    log: String,
    _tmp: tempfile::TempDir,
}

async fn run(task: &ScriptTask, vars: &[(&str, &str)]) -> Finished {
    run_in("ws", task, vars).await
}

async fn run_in(workspace: &str, task: &ScriptTask, vars: &[(&str, &str)]) -> Finished {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let mut controller = task
        .launch(
            &env(vars),
            &tmp.path().join(workspace),
            Arc::new(RealFileSystem),
            &TokioProcessLauncher,
            &mut Vec::new(),
        )
        .unwrap();

    let mut log = Vec::new();
    let code = poll_until_done(&mut controller, &mut log, TIMEOUT).await;
    Finished {
        controller,
        code,
        log: String::from_utf8_lossy(&log).into_owned(),
        _tmp: tmp,
    }
}

#[tokio::test]
async fn explicit_exit() {
    let Some(mut task) = task(r#"Write-Output "Hello, World!"; exit 1;"#) else {
        return;
    };
    task.capture_output();
    let mut run = run(&task, &[]).await;

    assert_eq!(run.code, 1);
    assert_eq!(
        trim_line_terminator(&run.controller.get_output().unwrap()),
        b"Hello, World!"
    );
    run.controller.cleanup().unwrap();
}

#[tokio::test]
async fn explicit_exit_zero_wins_over_recorded_errors() {
    let Some(task) = task(r#"Write-Error "recorded"; exit 0;"#) else {
        return;
    };
    let mut run = run(&task, &[]).await;

    assert_eq!(run.code, 0);
    run.controller.cleanup().unwrap();
}

#[tokio::test]
async fn implicit_exit() {
    let Some(task) = task(r#"Write-Output "Success!";"#) else {
        return;
    };
    let mut run = run(&task, &[]).await;

    assert_eq!(run.code, 0);
    assert!(run.log.contains("Success!"), "{}", run.log);
    run.controller.cleanup().unwrap();
}

#[tokio::test]
async fn implicit_error() {
    let Some(task) = task("MyBogus-Cmdlet") else {
        return;
    };
    let mut run = run(&task, &[]).await;

    assert_ne!(run.code, 0);
    run.controller.cleanup().unwrap();
}

#[tokio::test]
async fn explicit_error_is_a_failure() {
    let Some(mut task) = task(r#"Write-Output "Hello, World!"; throw "explicit error";"#) else {
        return;
    };
    task.capture_output();
    let mut run = run(&task, &[]).await;

    assert_eq!(run.code, 1);
    assert!(run.log.contains("explicit error"), "{}", run.log);
    run.controller.cleanup().unwrap();
}

#[tokio::test]
async fn verbose_stream_is_captured() {
    let Some(mut task) = task(r#"$VerbosePreference = "Continue"; Write-Verbose "Hello, World!""#)
    else {
        return;
    };
    task.capture_output();
    let mut run = run(&task, &[]).await;

    assert_eq!(run.code, 0);
    let output = String::from_utf8_lossy(&run.controller.get_output().unwrap()).into_owned();
    assert!(output.contains("Hello, World!"), "{output}");
    run.controller.cleanup().unwrap();
}

#[tokio::test]
async fn echo_env_var() {
    let Some(mut task) = task("echo envvar=$env:MYVAR") else {
        return;
    };
    task.capture_output();
    let mut run = run(&task, &[("MYVAR", "power$hell")]).await;

    assert_eq!(run.code, 0);
    assert_eq!(
        trim_line_terminator(&run.controller.get_output().unwrap()),
        b"envvar=power$hell"
    );
    run.controller.cleanup().unwrap();
}

#[tokio::test]
async fn percent_and_dollar_in_workspace_path() {
    let Some(task) = task("Write-Output 'ran'\nexit 7") else {
        return;
    };
    let mut done = run_in("100% $ws", &task, &[]).await;

    assert_eq!(done.code, 7);
    assert!(done.log.contains("ran"), "{}", done.log);
    done.controller.cleanup().unwrap();
}
