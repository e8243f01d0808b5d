//! lanprobe - Allow-LAN integration harness
//!
//! Drives a VPN client through connect/disconnect cycles and checks that the
//! local default gateway is reachable exactly when the client's Allow LAN
//! setting says it should be.

use clap::{Parser, Subcommand};
use lanprobe_core::error::{HarnessError, ProbeError};
use lanprobe_core::init_logging;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "lanprobe")]
#[command(about = "Verify a VPN client's Allow LAN setting against the local gateway")]
#[command(version)]
struct Cli {
    /// Configuration file [default: ~/.config/lanprobe/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// VPN client control binary, overrides client.ctl_path
    #[arg(long, global = true, value_name = "PATH")]
    ctl: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the allow-LAN suite (the default)
    Run {
        /// Only run scenarios whose name or group contains this text
        #[arg(long)]
        filter: Option<String>,

        /// Write the suite report as JSON to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
    /// Show the default gateway used as the LAN peer
    Gateway,
    /// Probe one LAN address
    Probe {
        /// Address of a peer on a directly attached subnet
        address: String,

        /// Seconds to wait for a reply [default: probe.timeout_secs]
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the VPN client's connection state
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let result = match cli::load_config(cli.config.as_deref(), cli.ctl.as_deref()) {
        Ok(config) => match cli.command {
            None => cli::run::run_suite(config, None, None).await,
            Some(Commands::Run { filter, report }) => {
                cli::run::run_suite(config, filter, report).await
            }
            Some(Commands::Gateway) => cli::gateway::run_gateway(&config),
            Some(Commands::Probe { address, timeout }) => {
                cli::probe::run_probe(&config, &address, timeout).await
            }
            Some(Commands::Status) => cli::status::run_status(&config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                HarnessError::Config(_) | HarnessError::Toml(_) => 2,
                // Nothing can be observed without a gateway or a prober (exit code 3)
                HarnessError::Resolution(_) => 3,
                HarnessError::Probe(ProbeError::Unavailable { .. }) => 3,
                HarnessError::Probe(ProbeError::InvalidTarget { .. }) => 1,
                // VPN client and I/O errors (exit code 1 - runtime)
                HarnessError::Control(_) => 1,
                HarnessError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
