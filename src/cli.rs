// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `durabletask`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "durabletask",
    version,
    about = "Run scripts whose status, log and output survive the controller.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Optional; defaults apply if missing.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path(), global = true)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DURABLETASK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Launch a script, follow its log until it exits, then clean up.
    ///
    /// Exits with the script's exit code.
    Run {
        /// Task kind: `powershell` or `sh`.
        #[arg(long, default_value = "powershell")]
        kind: String,

        /// Capture stdout separately and print it once the script is done.
        #[arg(long)]
        capture: bool,

        /// Workspace root; the control directory goes next to it.
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,

        /// Extra environment variable, `KEY=VALUE`. Repeatable.
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Script text.
        script: String,
    },

    /// Print `running` or the exit code recorded in a control directory.
    Status {
        #[arg(long, value_name = "CONTROL_DIR")]
        dir: PathBuf,
    },

    /// Print the whole log of a control directory.
    Log {
        #[arg(long, value_name = "CONTROL_DIR")]
        dir: PathBuf,
    },

    /// Remove a control directory.
    Cleanup {
        #[arg(long, value_name = "CONTROL_DIR")]
        dir: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_keep_dollars_and_equals() {
        assert_eq!(
            parse_env_pair("MYVAR=power$hell=1"),
            Ok(("MYVAR".to_string(), "power$hell=1".to_string()))
        );
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[test]
    fn run_subcommand_parses() {
        let args = CliArgs::try_parse_from([
            "durabletask",
            "run",
            "--kind",
            "sh",
            "--capture",
            "--env",
            "A=1",
            "echo $A",
        ])
        .unwrap();

        match args.command {
            Command::Run {
                kind,
                capture,
                env,
                script,
                workspace,
            } => {
                assert_eq!(kind, "sh");
                assert!(capture);
                assert_eq!(env, [("A".to_string(), "1".to_string())]);
                assert_eq!(script, "echo $A");
                assert!(workspace.is_none());
            }
            other => panic!("expected run, got {other:?}"),
        }
        assert_eq!(args.config, default_config_path());
    }

    #[test]
    fn config_path_can_be_overridden_after_the_subcommand() {
        let args =
            CliArgs::try_parse_from(["durabletask", "status", "--dir", "/c", "--config", "ci.toml"])
                .unwrap();
        assert_eq!(args.config, PathBuf::from("ci.toml"));
    }
}
