//! Error types for the lanprobe harness
//!
//! This module defines all error types used throughout the harness. Each
//! subsystem has its own enum so callers can tell an environment problem
//! (client unreachable, no raw-socket privilege) apart from a product defect
//! (state never settles) and from an ordinary assertion mismatch.

use std::net::IpAddr;
use thiserror::Error;

use crate::vpn::state::ConnectionState;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No usable default gateway
    #[error("Gateway resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Errors talking to the VPN client
    #[error("VPN client error: {0}")]
    Control(#[from] ControlError),

    /// Errors from the reachability prober
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HarnessError {
    /// Whether this error makes every remaining scenario meaningless
    pub fn is_fatal_for_suite(&self) -> bool {
        matches!(
            self,
            HarnessError::Resolution(_)
                | HarnessError::Probe(ProbeError::Unavailable { .. })
                | HarnessError::Config(_)
        )
    }

    /// Short classification used in scenario reports
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Config(_) => "ConfigError",
            HarnessError::Resolution(_) => "ResolutionError",
            HarnessError::Control(e) => e.kind(),
            HarnessError::Probe(ProbeError::InvalidTarget { .. }) => "InvalidTarget",
            HarnessError::Probe(ProbeError::Unavailable { .. }) => "ProbeUnavailable",
            HarnessError::Io(_) => "IoError",
            HarnessError::Toml(_) => "ConfigError",
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Default gateway lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No default route found on a physical interface")]
    NoDefaultRoute,

    #[error("Ambiguous default route: {candidates}")]
    Ambiguous { candidates: String },

    #[error("Failed to read routing table {path}: {reason}")]
    RouteTableUnreadable { path: String, reason: String },

    #[error("Configured gateway {address} is not on a directly attached subnet")]
    OverrideNotOnLink { address: IpAddr },

    #[error("Default gateway lookup is not supported on this platform")]
    Unsupported,
}

/// VPN client control errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("VPN client unavailable: {reason}")]
    ControllerUnavailable { reason: String },

    #[error("Setting {key}={value:?} rejected: {reason}")]
    SettingRejected {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Timed out after {elapsed_ms}ms waiting for {target}, last state: {last}")]
    StateTimeout {
        target: ConnectionState,
        last: ConnectionState,
        elapsed_ms: u64,
    },

    #[error("VPN client gave up on reaching {target} and returned to {state}")]
    TransitionAbandoned {
        target: ConnectionState,
        state: ConnectionState,
    },

    #[error("VPN client command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Failed to parse VPN client output: {output}")]
    ParseError { output: String },
}

impl ControlError {
    /// Short classification used in scenario reports
    pub fn kind(&self) -> &'static str {
        match self {
            ControlError::ControllerUnavailable { .. } => "ControllerUnavailable",
            ControlError::SettingRejected { .. } => "SettingRejected",
            ControlError::StateTimeout { .. } => "StateTimeout",
            ControlError::TransitionAbandoned { .. } => "TransitionAbandoned",
            ControlError::CommandFailed { .. } => "CommandFailed",
            ControlError::ParseError { .. } => "ParseError",
        }
    }
}

/// Reachability prober errors
///
/// Ordinary non-reachability is never an error, it is `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Invalid probe target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Probing unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, HarnessError>;
