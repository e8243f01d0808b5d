//! VPN client control through its command-line interface
//!
//! Runs the client's control CLI (`piactl` or a compatible binary) for every
//! query and command. Each invocation has its own timeout and is killed if
//! it overruns, so a wedged daemon can never block the harness forever.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ControlError;
use crate::types::{SettingKey, SettingValue};
use crate::vpn::control::VpnControl;
use crate::vpn::output_parser::{CtlFailure, OutputParser};
use crate::vpn::state::ConnectionState;

/// Keys the CLI reads and writes with plain `get`/`set`
///
/// Every other key goes through the unstable `applysettings` /
/// `dump daemon-settings` pair.
const DIRECT_KEYS: &[&str] = &[
    "allowlan",
    "debuglogging",
    "protocol",
    "region",
    "requestportforward",
];

/// Raw result of one CLI invocation
struct CtlOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// VPN client driven through its control CLI
pub struct CtlClient {
    program: PathBuf,
    command_timeout: Duration,
    parser: OutputParser,
}

impl CtlClient {
    /// Locate the control binary and build a client for it
    ///
    /// A missing binary means the client is not installed, which is reported
    /// as `ControllerUnavailable`.
    pub fn new(config: &ClientConfig) -> Result<Self, ControlError> {
        let program = which::which(&config.ctl_path).map_err(|e| {
            ControlError::ControllerUnavailable {
                reason: format!("Cannot find VPN client CLI `{}`: {}", config.ctl_path, e),
            }
        })?;

        debug!("Using VPN client CLI at {}", program.display());

        Ok(Self {
            program,
            command_timeout: config.command_timeout(),
            parser: OutputParser::new(),
        })
    }

    /// Path of the control binary in use
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command_line(&self, args: &[&str]) -> String {
        let name = self
            .program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string());
        format!("{} {}", name, args.join(" "))
    }

    async fn run(&self, args: &[&str]) -> Result<CtlOutput, ControlError> {
        let command_line = self.command_line(args);
        debug!(command = %command_line, "Running VPN client command");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.command_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ControlError::ControllerUnavailable {
                    reason: format!("Failed to run `{}`: {}", command_line, e),
                });
            }
            Err(_) => {
                warn!(command = %command_line, "VPN client command timed out");
                return Err(ControlError::ControllerUnavailable {
                    reason: format!(
                        "`{}` did not finish within {:?}",
                        command_line, self.command_timeout
                    ),
                });
            }
        };

        Ok(CtlOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Turn a CLI result into its stdout or a classified error
    ///
    /// `on_reject` builds the error used when the client refuses the request.
    fn check<F>(&self, args: &[&str], output: CtlOutput, on_reject: F) -> Result<String, ControlError>
    where
        F: FnOnce(String) -> ControlError,
    {
        if output.success {
            return Ok(output.stdout);
        }

        let combined = format!("{}\n{}", output.stderr, output.stdout);
        match self.parser.classify(&combined) {
            CtlFailure::DaemonUnreachable { message } => {
                Err(ControlError::ControllerUnavailable { reason: message })
            }
            CtlFailure::Rejected { message } => Err(on_reject(message)),
            CtlFailure::Other { message } => Err(ControlError::CommandFailed {
                command: self.command_line(args),
                reason: message,
            }),
        }
    }

    async fn run_checked(&self, args: &[&str]) -> Result<String, ControlError> {
        let output = self.run(args).await?;
        let command = self.command_line(args);
        self.check(args, output, |reason| ControlError::CommandFailed { command, reason })
    }

    async fn dump_daemon_settings(&self) -> Result<Map<String, Value>, ControlError> {
        let stdout = self.run_checked(&["-u", "dump", "daemon-settings"]).await?;
        match serde_json::from_str::<Value>(&stdout) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(ControlError::ParseError { output: stdout }),
        }
    }

    async fn apply_unstable(&self, batch: Map<String, Value>) -> Result<(), ControlError> {
        let keys = batch.keys().cloned().collect::<Vec<_>>().join(",");
        let payload = Value::Object(batch);
        let json = payload.to_string();
        let args = ["-u", "applysettings", json.as_str()];

        let output = self.run(&args).await?;
        self.check(&args, output, |reason| ControlError::SettingRejected {
            key: keys,
            value: json.clone(),
            reason,
        })?;
        Ok(())
    }
}

/// Whether a key is handled by plain `get`/`set`
pub fn is_direct_key(key: &SettingKey) -> bool {
    DIRECT_KEYS.contains(&key.as_str())
}

/// JSON form of a setting value for `applysettings`
///
/// `true`/`false` become booleans and integers become numbers. A custom
/// `overrideDNS` (one or more comma-separated addresses, or a JSON array)
/// becomes an array of address strings. Everything else, including the
/// empty string, stays a string.
pub fn to_json_value(key: &SettingKey, value: &SettingValue) -> Value {
    if key.as_str() == SettingKey::OVERRIDE_DNS {
        if let Some(servers) = dns_server_list(value.as_str()) {
            return Value::Array(servers.into_iter().map(Value::String).collect());
        }
    }

    match value.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        s => match s.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(s.to_string()),
        },
    }
}

/// Addresses of a custom DNS override, `None` for the named modes
fn dns_server_list(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    let servers: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).ok()?
    } else {
        trimmed.split(',').map(|s| s.trim().to_string()).collect()
    };

    let all_addresses =
        !servers.is_empty() && servers.iter().all(|s| s.parse::<std::net::IpAddr>().is_ok());
    all_addresses.then_some(servers)
}

/// Setting value read back from `dump daemon-settings`
///
/// Arrays of strings come back comma-separated, the form `to_json_value`
/// accepts.
pub fn from_json_value(value: &Value) -> SettingValue {
    match value {
        Value::String(s) => SettingValue::new(s.as_str()),
        Value::Null => SettingValue::new(""),
        Value::Array(items) if items.iter().all(Value::is_string) => SettingValue::new(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => SettingValue::new(other.to_string()),
    }
}

#[async_trait]
impl VpnControl for CtlClient {
    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn get_setting(&self, key: &SettingKey) -> Result<SettingValue, ControlError> {
        if is_direct_key(key) {
            let stdout = self.run_checked(&["get", key.as_str()]).await?;
            return Ok(SettingValue::new(stdout));
        }

        let settings = self.dump_daemon_settings().await?;
        settings
            .get(key.as_str())
            .map(from_json_value)
            .ok_or_else(|| ControlError::ParseError {
                output: format!("daemon-settings has no key {}", key),
            })
    }

    #[tracing::instrument(skip(self), fields(key = %key, value = %value))]
    async fn set_setting(&self, key: &SettingKey, value: &SettingValue) -> Result<(), ControlError> {
        if !is_direct_key(key) {
            let mut batch = Map::new();
            batch.insert(key.to_string(), to_json_value(key, value));
            return self.apply_unstable(batch).await;
        }

        let args = ["set", key.as_str(), value.as_str()];
        let output = self.run(&args).await?;
        self.check(&args, output, |reason| ControlError::SettingRejected {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        })?;
        Ok(())
    }

    async fn apply_settings(
        &self,
        settings: &[(SettingKey, SettingValue)],
    ) -> Result<(), ControlError> {
        // Consecutive unstable keys share one applysettings call; a direct key
        // flushes the pending batch first so the overall order is kept.
        let mut pending = Map::new();
        for (key, value) in settings {
            if is_direct_key(key) {
                if !pending.is_empty() {
                    self.apply_unstable(std::mem::take(&mut pending)).await?;
                }
                self.set_setting(key, value).await?;
            } else {
                pending.insert(key.to_string(), to_json_value(key, value));
            }
        }
        if !pending.is_empty() {
            self.apply_unstable(pending).await?;
        }
        Ok(())
    }

    async fn connect(&self) -> Result<(), ControlError> {
        self.run_checked(&["connect"]).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ControlError> {
        self.run_checked(&["disconnect"]).await?;
        Ok(())
    }

    async fn connection_state(&self) -> Result<ConnectionState, ControlError> {
        let stdout = self.run_checked(&["get", "connectionstate"]).await?;
        Ok(ConnectionState::from_client(&stdout))
    }
}
