//! Host network inspection
//!
//! Finding the LAN peer (the default gateway) and checking whether it answers.

pub mod gateway;
pub mod interfaces;
pub mod probe;

// Public re-exports
pub use gateway::GatewayResolver;
pub use interfaces::InterfaceFilter;
pub use probe::{PingProber, Reachability};
