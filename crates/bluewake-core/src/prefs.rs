// ── Persisted preferences ──
//
// The coordinator persists a handful of user choices through the host's
// `SettingsStore`. Keys are fixed; values are booleans or text. A missing
// or malformed value reads as the default and is never an error.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;
use crate::model::{Device, MacAddress};

/// Setting keys.
pub mod keys {
    pub const AUTO_RESUME_BT: &str = "auto_resume_bt";
    pub const STARTUP_RECONNECT: &str = "startup_reconnect";
    pub const RECONNECT_STRATEGY_ID: &str = "reconnect_strategy_id";
    pub const LAST_CONNECTED_ADDRESS: &str = "last_connected_address";
    pub const LAST_CONNECTED_NAME: &str = "last_connected_name";
    pub const AUTO_RESTORE_WIFI: &str = "auto_restore_wifi";

    pub const ALL: [&str; 6] = [
        AUTO_RESUME_BT,
        STARTUP_RECONNECT,
        RECONNECT_STRATEGY_ID,
        LAST_CONNECTED_ADDRESS,
        LAST_CONNECTED_NAME,
        AUTO_RESTORE_WIFI,
    ];

    /// Keys holding a boolean flag.
    pub fn is_flag(key: &str) -> bool {
        matches!(key, AUTO_RESUME_BT | STARTUP_RECONNECT | AUTO_RESTORE_WIFI)
    }
}

/// A stored setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

impl SettingValue {
    /// Booleans, plus the text spellings `true`/`false`/`on`/`off`/`1`/`0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Some(true),
                "false" | "off" | "no" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Host-provided key/value persistence.
pub trait SettingsStore: Send + Sync {
    fn read(&self, key: &str) -> Option<SettingValue>;
    fn write(&self, key: &str, value: SettingValue);
    fn remove(&self, key: &str);
    /// Persist pending writes.
    fn flush(&self) -> Result<(), CoreError>;
}

// ── MemorySettings ──────────────────────────────────────────────────

/// In-memory store; `flush` is a no-op that counts calls.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, SettingValue>>,
    flushes: Mutex<usize>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: impl IntoIterator<Item = (&'static str, SettingValue)>) -> Self {
        let store = Self::new();
        for (key, value) in entries {
            store.write(key, value);
        }
        store
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> BTreeMap<String, SettingValue> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl SettingsStore for MemorySettings {
    fn read(&self, key: &str) -> Option<SettingValue> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: SettingValue) {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    fn flush(&self) -> Result<(), CoreError> {
        *self.flushes.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
        Ok(())
    }
}

// ── Preferences ─────────────────────────────────────────────────────

/// Typed snapshot of every preference the coordinator reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preferences {
    pub auto_resume_bt: bool,
    pub startup_reconnect: bool,
    pub auto_restore_wifi: bool,
    pub reconnect_strategy_id: Option<String>,
    pub last_connected_address: Option<MacAddress>,
    pub last_connected_name: Option<String>,
}

impl Preferences {
    pub fn load(store: &dyn SettingsStore) -> Self {
        let flag = |key: &str| {
            store
                .read(key)
                .and_then(|v| v.as_bool())
                .unwrap_or_default()
        };
        let text = |key: &str| {
            store
                .read(key)
                .and_then(|v| v.as_text().map(str::to_owned))
                .filter(|s| !s.is_empty())
        };

        let last_connected_address = text(keys::LAST_CONNECTED_ADDRESS).and_then(|raw| {
            MacAddress::parse(&raw)
                .inspect_err(|_| warn!(%raw, "ignoring malformed last connected address"))
                .ok()
        });

        Self {
            auto_resume_bt: flag(keys::AUTO_RESUME_BT),
            startup_reconnect: flag(keys::STARTUP_RECONNECT),
            auto_restore_wifi: flag(keys::AUTO_RESTORE_WIFI),
            reconnect_strategy_id: text(keys::RECONNECT_STRATEGY_ID),
            last_connected_address,
            last_connected_name: text(keys::LAST_CONNECTED_NAME),
        }
    }

    /// Record a successful connection and flush.
    pub fn remember_device(store: &dyn SettingsStore, device: &Device) -> Result<(), CoreError> {
        store.write(
            keys::LAST_CONNECTED_ADDRESS,
            device.address.as_str().into(),
        );
        match &device.name {
            Some(name) => store.write(keys::LAST_CONNECTED_NAME, name.as_str().into()),
            None => store.remove(keys::LAST_CONNECTED_NAME),
        }
        store.flush()
    }

    pub fn forget_device(store: &dyn SettingsStore) -> Result<(), CoreError> {
        store.remove(keys::LAST_CONNECTED_ADDRESS);
        store.remove(keys::LAST_CONNECTED_NAME);
        store.flush()
    }

    pub fn set_flag(store: &dyn SettingsStore, key: &str, value: bool) -> Result<(), CoreError> {
        if !keys::is_flag(key) {
            return Err(CoreError::Settings {
                message: format!("'{key}' is not a boolean setting"),
            });
        }
        store.write(key, value.into());
        store.flush()
    }

    pub fn set_strategy(store: &dyn SettingsStore, id: &str) -> Result<(), CoreError> {
        store.write(keys::RECONNECT_STRATEGY_ID, id.into());
        store.flush()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_store_reads_defaults() {
        assert_eq!(Preferences::load(&MemorySettings::new()), Preferences::default());
    }

    #[test]
    fn tolerant_flag_parsing() {
        let store = MemorySettings::with([
            (keys::AUTO_RESUME_BT, "on".into()),
            (keys::STARTUP_RECONNECT, "maybe".into()),
            (keys::AUTO_RESTORE_WIFI, true.into()),
        ]);
        let prefs = Preferences::load(&store);
        assert!(prefs.auto_resume_bt);
        assert!(!prefs.startup_reconnect);
        assert!(prefs.auto_restore_wifi);
    }

    #[test]
    fn malformed_address_is_ignored() {
        let store = MemorySettings::with([(keys::LAST_CONNECTED_ADDRESS, "not-a-mac".into())]);
        assert_eq!(Preferences::load(&store).last_connected_address, None);
    }

    #[test]
    fn remember_and_forget_device_flush() {
        let store = MemorySettings::new();
        let device = Device {
            address: MacAddress::parse("E4:17:D8:2A:90:11").unwrap(),
            name: Some("Micro".into()),
            paired: true,
            trusted: true,
            connected: true,
            rssi: None,
            path: bluewake_api::ObjectPath::new("/org/bluez/hci0/dev_E4_17_D8_2A_90_11"),
        };
        Preferences::remember_device(&store, &device).unwrap();
        let prefs = Preferences::load(&store);
        assert_eq!(prefs.last_connected_address, Some(device.address.clone()));
        assert_eq!(prefs.last_connected_name.as_deref(), Some("Micro"));
        assert_eq!(store.flush_count(), 1);

        Preferences::forget_device(&store).unwrap();
        assert_eq!(Preferences::load(&store).last_connected_address, None);
        assert_eq!(store.flush_count(), 2);
    }

    #[test]
    fn set_flag_rejects_text_keys() {
        let store = MemorySettings::new();
        assert!(Preferences::set_flag(&store, keys::LAST_CONNECTED_NAME, true).is_err());
        Preferences::set_flag(&store, keys::AUTO_RESUME_BT, true).unwrap();
        assert_eq!(store.read(keys::AUTO_RESUME_BT), Some(SettingValue::Bool(true)));
    }
}
