#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bluewake_api::Bus;
use bluewake_config::{Config, ConfigError, SettingsFile, load_config_from, save_config};
use bluewake_core::{Preferences, SettingValue, SettingsStore, keys};
use pretty_assertions::assert_eq;

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());

    let core = config.core_config();
    assert_eq!(core.enable_policy.budget(), Duration::from_secs(3));
    assert_eq!(core.wifi_policy.budget(), Duration::from_secs(10));
    assert_eq!(core.adapter_path.as_str(), "/org/bluez/hci0");
}

#[test]
fn test_partial_file_overrides_only_named_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[transport]
bus = "session"
timeout_ms = 1500

[timing]
enable_attempts = 50

[firmware.bluetooth_daemon]
name = "mtkbtd"
command = ["/usr/bin/mtkbtd"]
"#,
    )
    .unwrap();

    let config = load_config_from(&path).unwrap();
    let transport = config.transport_config().unwrap();
    assert_eq!(transport.bus, Bus::Session);
    assert_eq!(transport.timeout, Duration::from_millis(1500));
    assert_eq!(transport.address, None);
    assert_eq!(config.transport.service, "org.bluez");

    let scripts = config.dbus_send().unwrap();
    assert_eq!(scripts.bus, Bus::Session);
    assert_eq!(scripts.reply_timeout, Duration::from_millis(1500));

    let core = config.core_config();
    assert_eq!(core.enable_policy.max_attempts, 50);
    assert_eq!(core.enable_policy.interval, Duration::from_millis(100));
    assert_eq!(core.processes.bluetooth_daemon.name, "mtkbtd");
    assert_eq!(core.processes.firmware_loader.name, "wmt_launcher");
}

#[test]
fn test_invalid_bus_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[transport]\nbus = \"carrier-pigeon\"\n").unwrap();

    let err = load_config_from(&path).unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation { ref field, .. } if field == "transport.bus"),
        "got {err:?}"
    );
}

#[test]
fn test_daemon_socket_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[daemon]\nsocket = \"/run/bluewake/ctl.sock\"\n").unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(
        config.socket_path(),
        std::path::PathBuf::from("/run/bluewake/ctl.sock")
    );
    assert!(Config::default().socket_path().ends_with("bluewake.sock"));
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = Config::default();
    config.wifi.interface = "eth1".into();
    config.log.json = true;

    save_config(&config, &path).unwrap();
    assert_eq!(load_config_from(&path).unwrap(), config);
}

// ── SettingsFile ────────────────────────────────────────────────────

#[test]
fn test_settings_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("settings.toml");

    let store = SettingsFile::open(&path).unwrap();
    Preferences::set_flag(&store, keys::AUTO_RESUME_BT, true).unwrap();
    Preferences::set_strategy(&store, "power_cycle").unwrap();

    let reopened = SettingsFile::open(&path).unwrap();
    let prefs = Preferences::load(&reopened);
    assert!(prefs.auto_resume_bt);
    assert_eq!(prefs.reconnect_strategy_id.as_deref(), Some("power_cycle"));
    assert!(!dir.path().join("state").join("settings.toml.tmp").exists());
}

#[test]
fn test_unflushed_writes_stay_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");

    let store = SettingsFile::open(&path).unwrap();
    store.write(keys::STARTUP_RECONNECT, SettingValue::Bool(true));
    assert_eq!(
        store.read(keys::STARTUP_RECONNECT),
        Some(SettingValue::Bool(true))
    );
    assert!(!path.exists());

    store.flush().unwrap();
    assert!(path.exists());
}

#[test]
fn test_foreign_values_are_kept_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(
        &path,
        "auto_resume_bt = true\nlast_connected_name = \"Micro\"\nretries = 3\n",
    )
    .unwrap();

    let store = SettingsFile::open(&path).unwrap();
    assert_eq!(store.read("retries"), Some(SettingValue::Text("3".into())));
    assert_eq!(
        store.read(keys::LAST_CONNECTED_NAME),
        Some(SettingValue::Text("Micro".into()))
    );

    store.remove(keys::LAST_CONNECTED_NAME);
    store.flush().unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("Micro"));
    assert!(text.contains("auto_resume_bt = true"));
}

#[test]
fn test_corrupt_settings_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    assert!(matches!(
        SettingsFile::open(&path).unwrap_err(),
        ConfigError::Parse { .. }
    ));
}
