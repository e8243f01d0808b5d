//! Core library for the lanprobe allow-LAN harness
//!
//! This crate drives a VPN client through its control CLI, finds the host's
//! default gateway, and checks whether that gateway stays reachable across
//! the allow-LAN scenarios.

pub mod error;
pub mod types;

pub mod config;
pub mod net;
pub mod scenario;
pub mod vpn;

/// Initialize logging infrastructure
///
/// Sets up tracing with systemd journal logging when running as a unit.
/// Otherwise logs to stderr with pretty formatting. `verbose` raises the
/// level from INFO to DEBUG.
pub fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(level)
                .init();
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr),
        )
        .with(level)
        .init();

    Ok(())
}
