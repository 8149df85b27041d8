// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::control::ControlFiles;
use crate::types::{ExecutionTarget, FanOutPolicy, TargetSetting};

/// Raw configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// poll_interval_ms = 250
/// workspace = "."
///
/// [files]
/// log = "log.txt"
/// output = "output.txt"
/// result = "result.txt"
///
/// [powershell]
/// program = "pwsh"
/// target = "auto"
///
/// [fanout]
/// policy = "fail-fast"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Control directory file names from `[files]`.
    #[serde(default)]
    pub files: FilesSection,

    #[serde(default)]
    pub powershell: PowershellSection,

    #[serde(default)]
    pub fanout: FanOutSection,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Delay between polls of a running task, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Workspace root used when none is given on the command line.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            workspace: default_workspace(),
        }
    }
}

/// `[files]` section. Missing keys fall back to [`ControlFiles::default`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesSection {
    pub log: Option<String>,
    pub output: Option<String>,
    pub result: Option<String>,
}

impl FilesSection {
    pub fn to_control_files(&self) -> ControlFiles {
        let defaults = ControlFiles::default();
        ControlFiles {
            log: self.log.clone().unwrap_or(defaults.log),
            output: self.output.clone().unwrap_or(defaults.output),
            result: self.result.clone().unwrap_or(defaults.result),
        }
    }
}

/// `[powershell]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowershellSection {
    /// Interpreter binary. Defaults to `powershell` / `powershell.exe`
    /// depending on the target.
    pub program: Option<String>,

    #[serde(default)]
    pub target: TargetSetting,
}

/// `[fanout]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FanOutSection {
    #[serde(default)]
    pub policy: FanOutPolicy,
}

/// Validated configuration used by the rest of the crate.
///
/// Build it from a [`RawConfigFile`] with `Config::try_from`, or take
/// `Config::default()` when no file exists.
#[derive(Debug, Clone)]
pub struct Config {
    poll_interval: Duration,
    workspace: PathBuf,
    files: ControlFiles,
    powershell_program: Option<String>,
    target: ExecutionTarget,
    fan_out_policy: FanOutPolicy,
}

impl Config {
    /// Build a `Config` without validation. Only used by `TryFrom`.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            poll_interval: Duration::from_millis(raw.config.poll_interval_ms),
            workspace: raw.config.workspace,
            files: raw.files.to_control_files(),
            powershell_program: raw.powershell.program,
            target: raw.powershell.target.resolve(),
            fan_out_policy: raw.fanout.policy,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn files(&self) -> &ControlFiles {
        &self.files
    }

    pub fn powershell_program(&self) -> Option<&str> {
        self.powershell_program.as_deref()
    }

    pub fn target(&self) -> ExecutionTarget {
        self.target
    }

    pub fn fan_out_policy(&self) -> FanOutPolicy {
        self.fan_out_policy
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}
