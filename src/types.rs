use std::str::FromStr;

use serde::Deserialize;

/// What a fan-out writer does when one of its sinks fails.
///
/// - `FailFast`: the first failing sink aborts the call; later sinks are not
///   attempted for that call (default).
/// - `BestEffort`: every sink is attempted; the first error is still
///   returned once all sinks have been tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FanOutPolicy {
    #[default]
    FailFast,
    BestEffort,
}

impl FromStr for FanOutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(FanOutPolicy::FailFast),
            "best-effort" | "besteffort" => Ok(FanOutPolicy::BestEffort),
            other => Err(format!(
                "invalid fan-out policy: {other} (expected \"fail-fast\" or \"best-effort\")"
            )),
        }
    }
}

/// The flavour of host the interpreter runs on.
///
/// The Windows build of PowerShell accepts `-ExecutionPolicy`; the
/// cross-platform build rejects it, so argv differs per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    Unix,
    Windows,
}

impl ExecutionTarget {
    /// Target matching the machine we are running on.
    pub fn host() -> Self {
        if cfg!(windows) {
            ExecutionTarget::Windows
        } else {
            ExecutionTarget::Unix
        }
    }
}

/// Target as written in config: `"auto"` defers to [`ExecutionTarget::host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSetting {
    #[default]
    Auto,
    Unix,
    Windows,
}

impl TargetSetting {
    pub fn resolve(self) -> ExecutionTarget {
        match self {
            TargetSetting::Auto => ExecutionTarget::host(),
            TargetSetting::Unix => ExecutionTarget::Unix,
            TargetSetting::Windows => ExecutionTarget::Windows,
        }
    }
}

impl FromStr for TargetSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(TargetSetting::Auto),
            "unix" => Ok(TargetSetting::Unix),
            "windows" => Ok(TargetSetting::Windows),
            other => Err(format!(
                "invalid target: {other} (expected \"auto\", \"unix\" or \"windows\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_both_spellings() {
        assert_eq!("fail-fast".parse::<FanOutPolicy>(), Ok(FanOutPolicy::FailFast));
        assert_eq!(" Best-Effort ".parse::<FanOutPolicy>(), Ok(FanOutPolicy::BestEffort));
        assert!("sometimes".parse::<FanOutPolicy>().is_err());
    }

    #[test]
    fn explicit_targets_ignore_host() {
        assert_eq!(TargetSetting::Windows.resolve(), ExecutionTarget::Windows);
        assert_eq!(TargetSetting::Unix.resolve(), ExecutionTarget::Unix);
        assert_eq!(TargetSetting::Auto.resolve(), ExecutionTarget::host());
    }
}
