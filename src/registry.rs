// src/registry.rs

//! Task kinds available to the command line and other callers.
//!
//! Built once at start-up from [`Config`]; maps a kind name such as
//! `"powershell"` to the wrapper strategy that runs it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::control::ControlFiles;
use crate::errors::{DurableTaskError, Result};
use crate::task::ScriptTask;
use crate::types::FanOutPolicy;
use crate::wrapper::{PosixShellWrapper, PowershellWrapper, ScriptWrapper};

#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    kinds: BTreeMap<String, Arc<dyn ScriptWrapper>>,
    files: ControlFiles,
    fan_out_policy: FanOutPolicy,
}

impl TaskRegistry {
    /// Empty registry using default file names and fail-fast fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `powershell` and `sh` kinds, configured
    /// from `cfg`.
    pub fn with_defaults(cfg: &Config) -> Self {
        let powershell = match cfg.powershell_program() {
            Some(program) => PowershellWrapper::with_program(program, cfg.target()),
            None => PowershellWrapper::new(cfg.target()),
        };

        let mut registry = Self {
            kinds: BTreeMap::new(),
            files: cfg.files().clone(),
            fan_out_policy: cfg.fan_out_policy(),
        };
        registry.register("powershell", Arc::new(powershell));
        registry.register("sh", Arc::new(PosixShellWrapper::new()));
        registry
    }

    /// Add or replace a kind.
    pub fn register(&mut self, kind: impl Into<String>, wrapper: Arc<dyn ScriptWrapper>) {
        self.kinds.insert(kind.into(), wrapper);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(|k| k.as_str())
    }

    pub fn display_name(&self, kind: &str) -> Option<&str> {
        self.kinds.get(kind).map(|w| w.display_name())
    }

    /// A task of the given kind for `script`.
    pub fn create(&self, kind: &str, script: impl Into<String>) -> Result<ScriptTask> {
        let wrapper = self.kinds.get(kind).ok_or_else(|| {
            DurableTaskError::ConfigError(format!(
                "unknown task kind '{}' (known: {})",
                kind,
                self.kinds().collect::<Vec<_>>().join(", ")
            ))
        })?;

        Ok(ScriptTask::new(script, Arc::clone(wrapper))
            .with_files(self.files.clone())
            .with_fan_out_policy(self.fan_out_policy))
    }
}
