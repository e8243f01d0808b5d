//! Suite run command

use colored::Colorize;
use lanprobe_core::config::HarnessConfig;
use lanprobe_core::error::HarnessError;
use lanprobe_core::net::{GatewayResolver, PingProber};
use lanprobe_core::scenario::{allow_lan_suite, SuiteContext, SuiteReport, SuiteRunner, Verdict};
use lanprobe_core::vpn::CtlClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Run the allow-LAN suite against the real client and network
pub async fn run_suite(
    config: HarnessConfig,
    filter: Option<String>,
    report_path: Option<PathBuf>,
) -> Result<super::Outcome, HarnessError> {
    let client = CtlClient::new(&config.client)?;

    // The prober binds to the gateway's interface, so resolve it up front
    let gateway = GatewayResolver::new(&config.gateway).resolve_default_gateway()?;
    let prober = PingProber::new(&config.probe, &config.gateway)?
        .with_interface_hint(gateway.interface.clone());

    println!("{} {}", "LAN peer:".bold(), gateway);
    println!("{} {}", "VPN client:".bold(), client.program().display());
    println!();

    let ctx = SuiteContext::new(config, Arc::new(client), Arc::new(prober)).with_gateway(gateway);
    let mut runner = SuiteRunner::new(ctx);
    if let Some(filter) = filter {
        runner = runner.with_filter(filter);
    }

    let report = runner.run(&allow_lan_suite()).await?;
    print_report(&report);

    if let Some(path) = report_path {
        let json = report.to_json().map_err(std::io::Error::from)?;
        std::fs::write(&path, json)?;
        info!("Wrote report to {:?}", path);
    }

    Ok(if report.aborted.is_some() {
        super::Outcome::Aborted
    } else if report.is_success() {
        super::Outcome::Success
    } else {
        super::Outcome::Failed
    })
}

fn reachability(reachable: bool) -> &'static str {
    if reachable {
        "reachable"
    } else {
        "unreachable"
    }
}

fn print_report(report: &SuiteReport) {
    for outcome in &report.outcomes {
        match &outcome.verdict {
            Verdict::Passed => println!(
                "{} {} ({} ms)",
                "PASS".green().bold(),
                outcome.name,
                outcome.duration_ms
            ),
            Verdict::Failed { expected, observed } => println!(
                "{} {}: expected {}, observed {}",
                "FAIL".red().bold(),
                outcome.name,
                reachability(*expected),
                reachability(*observed)
            ),
            Verdict::Errored { kind, message } => println!(
                "{} {}: {} [{}]",
                "ERROR".yellow().bold(),
                outcome.name,
                message,
                kind
            ),
        }
        if let Some(reason) = &outcome.teardown_error {
            println!("     {} {}", "teardown failed:".red(), reason);
        }
    }

    println!();
    if let Some(reason) = &report.aborted {
        println!("{} {}", "Suite aborted:".red().bold(), reason);
    }
    if let Some(reason) = &report.teardown_error {
        println!("{} {}", "Teardown failed:".red().bold(), reason);
    }

    let summary = format!(
        "{} passed, {} failed in {} ms",
        report.passed(),
        report.failed(),
        report.duration_ms
    );
    if report.is_success() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}
