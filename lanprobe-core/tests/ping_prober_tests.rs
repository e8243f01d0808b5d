//! Integration tests for the ping prober against a scripted `ping`

use lanprobe_core::config::{GatewayConfig, ProbeConfig};
use lanprobe_core::error::ProbeError;
use lanprobe_core::net::{PingProber, Reachability};
use lanprobe_core::types::GatewayAddress;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

/// Records its arguments, then writes `$STDERR` and exits with `$CODE`
fn fake_ping(stderr: &str, code: i32) -> (TempDir, PingProber) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ping");
    let body = format!(
        "#!/bin/sh\necho \"$@\" > \"$(dirname \"$0\")/args\"\nprintf '%s' '{}' >&2\nexit {}\n",
        stderr, code
    );
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

    let probe = ProbeConfig {
        ping_path: path.to_string_lossy().to_string(),
        ..ProbeConfig::default()
    };
    let prober = PingProber::new(&probe, &GatewayConfig::default()).unwrap();
    (dir, prober)
}

fn recorded_args(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("args"))
        .unwrap()
        .trim()
        .to_string()
}

fn gateway() -> GatewayAddress {
    GatewayAddress::new("192.168.1.1".parse().unwrap(), "eth0")
}

#[tokio::test]
async fn test_preflight_binds_to_gateway_interface() {
    let (dir, prober) = fake_ping("", 0);

    prober.preflight(&gateway()).await.unwrap();

    assert_eq!(recorded_args(&dir), "-4 -n -c 1 -w 1 -I eth0 192.168.1.1");
}

#[tokio::test]
async fn test_preflight_fails_without_bind_privilege() {
    let (dir, prober) = fake_ping("ping: SO_BINDTODEVICE eth0: Operation not permitted", 2);

    let result = prober.preflight(&gateway()).await;

    match result {
        Err(ProbeError::Unavailable { reason }) => assert!(reason.contains("SO_BINDTODEVICE")),
        other => panic!("Expected ProbeUnavailable, got {:?}", other),
    }
    assert!(recorded_args(&dir).contains("-I eth0"));
}

#[tokio::test]
async fn test_preflight_tolerates_silent_peer() {
    let (_dir, prober) = fake_ping("", 1);

    assert!(prober.preflight(&gateway()).await.is_ok());
}

#[test]
fn test_missing_ping_is_unavailable() {
    let probe = ProbeConfig {
        ping_path: "/nonexistent/lanprobe-ping".to_string(),
        ..ProbeConfig::default()
    };
    assert!(matches!(
        PingProber::new(&probe, &GatewayConfig::default()),
        Err(ProbeError::Unavailable { .. })
    ));
}
