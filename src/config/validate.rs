// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{Config, RawConfigFile};
use crate::errors::{DurableTaskError, Result};

impl TryFrom<RawConfigFile> for Config {
    type Error = crate::errors::DurableTaskError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_file_names(cfg)?;
    validate_powershell(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.poll_interval_ms == 0 {
        return Err(DurableTaskError::ConfigError(
            "[config].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_file_names(cfg: &RawConfigFile) -> Result<()> {
    let files = cfg.files.to_control_files();
    let mut seen = HashSet::new();

    for (key, name) in [
        ("log", &files.log),
        ("output", &files.output),
        ("result", &files.result),
    ] {
        if name.trim().is_empty() {
            return Err(DurableTaskError::ConfigError(format!(
                "[files].{key} must not be empty"
            )));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(DurableTaskError::ConfigError(format!(
                "[files].{key} must be a plain file name (got '{name}')"
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(DurableTaskError::ConfigError(format!(
                "[files].{key} reuses the file name '{name}'"
            )));
        }
    }
    Ok(())
}

fn validate_powershell(cfg: &RawConfigFile) -> Result<()> {
    if let Some(program) = &cfg.powershell.program {
        if program.trim().is_empty() {
            return Err(DurableTaskError::ConfigError(
                "[powershell].program must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}
