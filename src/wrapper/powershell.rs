// src/wrapper/powershell.rs

use std::path::Path;

use crate::types::ExecutionTarget;

use super::{GeneratedScripts, ScriptWrapper};

const MAIN_FILE: &str = "powershellMain.ps1";
const WRAPPER_FILE: &str = "powershellWrapper.ps1";
const ENCODING_PREAMBLE: &str = r#"$PSDefaultParameterValues["*:Encoding"] = "UTF8";"#;

/// PowerShell strategy.
///
/// Exit code policy of the generated main script, in order:
/// 1. an explicit `exit N` in the user script ends the main script right
///    there with `N`, even `exit 0`, and nothing below runs;
/// 2. otherwise a non-zero `$LastExitCode` left by a native command wins;
/// 3. otherwise any recorded error (caught exception, `$error`, `!$?`)
///    forces `1`;
/// 4. otherwise `0`.
///
/// A terminating error is caught, printed to stdout and then falls through
/// to rule 3; it never aborts the wrapper.
#[derive(Debug, Clone)]
pub struct PowershellWrapper {
    program: String,
    target: ExecutionTarget,
}

impl PowershellWrapper {
    /// Wrapper for `target` using the stock interpreter name for it.
    pub fn new(target: ExecutionTarget) -> Self {
        let program = match target {
            ExecutionTarget::Unix => "powershell",
            ExecutionTarget::Windows => "powershell.exe",
        };
        Self::with_program(program, target)
    }

    /// Wrapper using a specific interpreter binary, e.g. `pwsh`.
    pub fn with_program(program: impl Into<String>, target: ExecutionTarget) -> Self {
        Self {
            program: program.into(),
            target,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn target(&self) -> ExecutionTarget {
        self.target
    }
}

impl ScriptWrapper for PowershellWrapper {
    fn display_name(&self) -> &str {
        "PowerShell"
    }

    fn main_file_name(&self) -> &str {
        MAIN_FILE
    }

    fn wrapper_file_name(&self) -> &str {
        WRAPPER_FILE
    }

    fn generate(&self, script: &str, capture_output: bool, main_path: &Path) -> GeneratedScripts {
        GeneratedScripts {
            main_script: main_script(script),
            wrapper_script: wrapper_script(&quote(main_path), capture_output),
        }
    }

    fn command_line(&self, wrapper_path: &Path) -> Vec<String> {
        let wrapper = wrapper_path.to_string_lossy().into_owned();
        let mut args = vec![self.program.clone(), "-NonInteractive".to_string()];
        // Cross-platform PowerShell rejects -ExecutionPolicy.
        if self.target == ExecutionTarget::Windows {
            args.push("-ExecutionPolicy".to_string());
            args.push("Bypass".to_string());
        }
        args.push("-File".to_string());
        args.push(wrapper);
        args
    }
}

fn main_script(script: &str) -> String {
    [
        "try {",
        script,
        "} catch {",
        "Write-Output $_;",
        "}",
        "if ($LastExitCode -ne $null -and $LastExitCode -ne 0) {",
        "exit $LastExitCode;",
        "} elseif ($error.Count -gt 0 -or !$?) {",
        "exit 1;",
        "} else {",
        "exit 0;",
        "}",
    ]
    .join("\r\n")
}

fn wrapper_script(main: &str, capture_output: bool) -> String {
    let mut cmd = format!(r#"{ENCODING_PREAMBLE} & "{main}"; $mainExit = $LastExitCode;"#);
    if capture_output {
        cmd.push_str(
            " if ($error.Count -gt 0) { Write-Error ($error -join [Environment]::NewLine) };",
        );
    }
    cmd.push_str(" exit $mainExit");
    cmd
}

/// Escape `path` for use inside a double-quoted PowerShell string.
///
/// Only the backtick, `$` and `"` are special there; everything else,
/// `%` included, stays as is.
pub fn quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut quoted = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '`' | '$' | '"') {
            quoted.push('`');
        }
        quoted.push(c);
    }
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(script: &str, capture: bool) -> GeneratedScripts {
        PowershellWrapper::new(ExecutionTarget::Unix).generate(
            script,
            capture,
            Path::new("/ws@tmp/durable-1/powershellMain.ps1"),
        )
    }

    #[test]
    fn main_script_checks_exit_code_before_error_state() {
        let main = generate("exit 0", false).main_script;

        let exit_check = main.find("$LastExitCode -ne $null").unwrap();
        let error_check = main.find("$error.Count -gt 0").unwrap();
        assert!(exit_check < error_check);
        assert!(main.starts_with("try {\r\nexit 0\r\n} catch {"));
        assert!(main.ends_with("} else {\r\nexit 0;\r\n}"));
    }

    #[test]
    fn caught_errors_fall_through_instead_of_exiting() {
        let main = generate("throw 'boom'", false).main_script;
        let catch_block = &main[main.find("catch {").unwrap()..main.find("if (").unwrap()];

        assert!(catch_block.contains("Write-Output $_"));
        assert!(!catch_block.contains("exit"));
    }

    #[test]
    fn capture_mode_echoes_errors_to_stderr() {
        let plain = generate("echo hi", false).wrapper_script;
        let captured = generate("echo hi", true).wrapper_script;

        assert!(plain.starts_with(ENCODING_PREAMBLE));
        assert!(!plain.contains("Write-Error"));
        assert!(captured.contains("Write-Error ($error -join [Environment]::NewLine)"));
        assert!(captured.ends_with("exit $mainExit"));
    }

    #[test]
    fn percent_in_main_path_is_kept_verbatim() {
        let scripts = PowershellWrapper::new(ExecutionTarget::Unix).generate(
            "echo hi",
            false,
            Path::new("/jobs/100%/powershellMain.ps1"),
        );
        assert!(scripts.wrapper_script.contains(r#"& "/jobs/100%/powershellMain.ps1";"#));
        assert!(!scripts.wrapper_script.contains("%%"));
    }

    #[test]
    fn expanding_characters_in_main_path_are_escaped() {
        assert_eq!(
            quote(Path::new(r#"/jobs/$HOME/a`b"c/powershellMain.ps1"#)),
            r#"/jobs/`$HOME/a``b`"c/powershellMain.ps1"#
        );
        assert_eq!(quote(Path::new(r"C:\ws 100%\x.ps1")), r"C:\ws 100%\x.ps1");
    }

    #[test]
    fn windows_target_adds_execution_policy() {
        let path = Path::new("w.ps1");
        let unix = PowershellWrapper::new(ExecutionTarget::Unix).command_line(path);
        let windows = PowershellWrapper::new(ExecutionTarget::Windows).command_line(path);

        assert_eq!(unix, ["powershell", "-NonInteractive", "-File", "w.ps1"]);
        assert_eq!(
            windows,
            [
                "powershell.exe",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-File",
                "w.ps1"
            ]
        );
    }

    #[test]
    fn custom_program_is_used() {
        let argv = PowershellWrapper::with_program("pwsh", ExecutionTarget::Unix)
            .command_line(Path::new("w.ps1"));
        assert_eq!(argv[0], "pwsh");
    }
}
