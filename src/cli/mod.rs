//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

use lanprobe_core::config::toml_config;
use lanprobe_core::config::HarnessConfig;
use lanprobe_core::error::HarnessError;
use std::path::Path;

pub mod gateway;
pub mod probe;
pub mod run;
pub mod status;

/// How a command that ran to completion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A scenario failed or the probed peer did not answer
    Failed,
    /// The suite stopped early on a fatal error
    Aborted,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failed => 1,
            Outcome::Aborted => 3,
        }
    }
}

/// Load the configuration and apply command-line overrides
pub fn load_config(path: Option<&Path>, ctl: Option<&str>) -> Result<HarnessConfig, HarnessError> {
    let mut config = match path {
        Some(path) => toml_config::load_config_from_path(path)?,
        None => toml_config::load_config()?,
    };

    if let Some(ctl) = ctl {
        config.client.ctl_path = ctl.to_string();
        config.validate()?;
    }

    Ok(config)
}
