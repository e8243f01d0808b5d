//! TOML configuration file I/O
//!
//! Loads the harness configuration from the user's configuration directory
//! or from an explicit path.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::error::{ConfigError, HarnessError};

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns ~/.config/lanprobe, or LANPROBE_CONFIG_DIR if set. Under sudo the
/// invoking user's home is used so root runs pick up the same file.
pub fn get_config_dir() -> Result<PathBuf, HarnessError> {
    if let Ok(config_dir) = std::env::var("LANPROBE_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = if let Ok(sudo_user) = std::env::var("SUDO_USER") {
        std::env::var("SUDO_HOME").unwrap_or_else(|_| format!("/home/{}", sudo_user))
    } else {
        std::env::var("HOME").map_err(|_| {
            HarnessError::Config(ConfigError::IoError {
                message: "HOME environment variable not set".to_string(),
            })
        })?
    };

    Ok(PathBuf::from(home).join(".config").join("lanprobe"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, HarnessError> {
    let config_dir = get_config_dir()?;
    Ok(config_dir.join(CONFIG_FILE_NAME))
}

/// Load the configuration from the default location
///
/// A missing default file is not an error: built-in defaults apply.
pub fn load_config() -> Result<HarnessConfig, HarnessError> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        debug!("No configuration at {:?}, using defaults", config_path);
        return Ok(HarnessConfig::default());
    }
    load_config_from_path(&config_path)
}

/// Load the configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<HarnessConfig, HarnessError> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HarnessError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => HarnessError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config = parse_config(&contents)?;
    info!("Loaded configuration from {:?}", path.as_ref());
    Ok(config)
}

/// Parse and validate configuration text
pub fn parse_config(contents: &str) -> Result<HarnessConfig, HarnessError> {
    let config: HarnessConfig = toml::from_str(contents)?;

    config.validate()?;

    debug!(
        ctl = %config.client.ctl_path,
        connect_timeout_secs = config.client.connect_timeout_secs,
        probe_timeout_secs = config.probe.timeout_secs,
        "Configuration validated"
    );

    Ok(config)
}
