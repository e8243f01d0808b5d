//! VPN client module
//!
//! Controls the external VPN client: its settings and its connection state.

pub mod connection;
pub mod control;
pub mod ctl;
pub mod output_parser;
pub mod poll;
pub mod settings;
pub mod state;

// Public re-exports
pub use connection::ConnectionController;
pub use control::VpnControl;
pub use ctl::CtlClient;
pub use settings::SettingsController;
pub use state::ConnectionState;
