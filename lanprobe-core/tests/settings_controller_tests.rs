//! Integration tests for confirmed settings application

mod common;

use common::{fast_client_config, FakeClient};
use lanprobe_core::config::StableSettings;
use lanprobe_core::error::ControlError;
use lanprobe_core::types::{Applied, SettingKey, SettingValue};
use lanprobe_core::vpn::SettingsController;

#[tokio::test]
async fn test_applied_setting_reads_back() {
    let client = FakeClient::new();
    let settings = SettingsController::new(client.clone(), &fast_client_config());

    let applied = settings
        .apply(&SettingKey::from("killswitch"), &SettingValue::from("auto"))
        .await
        .unwrap();

    assert_eq!(applied, Applied::Changed);
    assert_eq!(client.setting("killswitch"), "auto");
}

#[tokio::test]
async fn test_reapplying_same_value_issues_no_write() {
    let client = FakeClient::new();
    let settings = SettingsController::new(client.clone(), &fast_client_config());

    settings.toggle(SettingKey::ALLOW_LAN, true).await.unwrap();
    let writes = client.count("set ");
    let applied = settings.toggle(SettingKey::ALLOW_LAN, true).await.unwrap();

    assert_eq!(applied, Applied::Unchanged);
    assert_eq!(client.count("set "), writes);
    assert_eq!(client.setting("allowlan"), "true");
}

#[tokio::test]
async fn test_rejected_value_leaves_previous_value() {
    let client = FakeClient::new();
    client.reject("killswitch", "sometimes");
    let settings = SettingsController::new(client.clone(), &fast_client_config());

    let result = settings
        .apply(&SettingKey::from("killswitch"), &SettingValue::from("sometimes"))
        .await;

    assert!(matches!(result, Err(ControlError::SettingRejected { .. })));
    assert_eq!(client.setting("killswitch"), "off");
}

#[tokio::test]
async fn test_unconfirmed_write_is_rejected_after_settle_timeout() {
    let client = FakeClient::new();
    client.ignore_writes_to("allowlan");
    let settings = SettingsController::new(client.clone(), &fast_client_config());

    let result = settings.toggle(SettingKey::ALLOW_LAN, true).await;

    match result {
        Err(ControlError::SettingRejected { key, reason, .. }) => {
            assert_eq!(key, "allowlan");
            assert!(reason.contains("still reports"));
        }
        other => panic!("Expected SettingRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_client() {
    let client = FakeClient::new();
    client.set_unavailable(true);
    let settings = SettingsController::new(client.clone(), &fast_client_config());

    let result = settings.toggle(SettingKey::ALLOW_LAN, false).await;
    assert!(matches!(
        result,
        Err(ControlError::ControllerUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_stable_settings_keep_empty_dns_value_and_order() {
    let client = FakeClient::new();
    let settings = SettingsController::new(client.clone(), &fast_client_config());

    let applied = settings
        .apply_stable(&StableSettings::default())
        .await
        .unwrap();

    assert_eq!(applied, Applied::Changed);
    assert_eq!(client.setting("overrideDNS"), "");
    assert_eq!(client.setting("killswitch"), "auto");

    let writes: Vec<String> = client
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("set "))
        .collect();
    assert_eq!(writes, vec!["set overrideDNS ", "set killswitch auto"]);

    let again = settings
        .apply_stable(&StableSettings::default())
        .await
        .unwrap();
    assert_eq!(again, Applied::Unchanged);
}

#[tokio::test]
async fn test_apply_many_stops_at_first_rejection() {
    let client = FakeClient::new();
    client.reject("killswitch", "bogus");
    let settings = SettingsController::new(client.clone(), &fast_client_config());

    let entries = vec![
        (SettingKey::from("killswitch"), SettingValue::from("bogus")),
        (SettingKey::from("allowlan"), SettingValue::from(true)),
    ];
    let result = settings.apply_many(&entries).await;

    assert!(matches!(result, Err(ControlError::SettingRejected { .. })));
    assert_eq!(client.setting("allowlan"), "false");
}
