// src/wrapper/posix.rs

use std::path::Path;

use super::{GeneratedScripts, ScriptWrapper};

/// `/bin/sh` strategy.
///
/// The shell already produces a numeric status for every run: `exit N` is
/// reported verbatim and otherwise the last command's status is used (127
/// for an unknown command). There is no error accumulator to echo, so
/// capture mode changes nothing in the generated text.
#[derive(Debug, Clone)]
pub struct PosixShellWrapper {
    program: String,
}

impl PosixShellWrapper {
    pub fn new() -> Self {
        Self::with_program("sh")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PosixShellWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptWrapper for PosixShellWrapper {
    fn display_name(&self) -> &str {
        "shell"
    }

    fn main_file_name(&self) -> &str {
        "script.sh"
    }

    fn wrapper_file_name(&self) -> &str {
        "wrapper.sh"
    }

    fn generate(&self, script: &str, _capture_output: bool, main_path: &Path) -> GeneratedScripts {
        let mut main_script = String::from("#!/bin/sh\n");
        main_script.push_str(script);
        if !script.ends_with('\n') {
            main_script.push('\n');
        }

        let wrapper_script = format!(
            "#!/bin/sh\n{} {}\nexit $?\n",
            self.program,
            single_quote(&main_path.to_string_lossy())
        );

        GeneratedScripts {
            main_script,
            wrapper_script,
        }
    }

    fn command_line(&self, wrapper_path: &Path) -> Vec<String> {
        vec![
            self.program.clone(),
            wrapper_path.to_string_lossy().into_owned(),
        ]
    }
}

/// Quote for `sh`: everything literal, embedded `'` closed and re-opened.
fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
