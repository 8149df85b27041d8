#![allow(dead_code)]

use durabletask::config::{Config, RawConfigFile};
use durabletask::types::FanOutPolicy;

/// Builder for `Config` to simplify test setup.
pub struct ConfigBuilder {
    raw: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawConfigFile::default(),
        }
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.raw.config.poll_interval_ms = ms;
        self
    }

    pub fn log_file(mut self, name: &str) -> Self {
        self.raw.files.log = Some(name.to_string());
        self
    }

    pub fn output_file(mut self, name: &str) -> Self {
        self.raw.files.output = Some(name.to_string());
        self
    }

    pub fn result_file(mut self, name: &str) -> Self {
        self.raw.files.result = Some(name.to_string());
        self
    }

    pub fn powershell_program(mut self, program: &str) -> Self {
        self.raw.powershell.program = Some(program.to_string());
        self
    }

    pub fn fan_out_policy(mut self, policy: FanOutPolicy) -> Self {
        self.raw.fanout.policy = policy;
        self
    }

    pub fn try_build(self) -> durabletask::errors::Result<Config> {
        Config::try_from(self.raw)
    }

    pub fn build(self) -> Config {
        self.try_build().expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
