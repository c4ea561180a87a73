//! `settings` handlers. These touch only the preferences file.

use serde::Serialize;
use tabled::Tabled;

use bluewake_config::{Config, SettingsFile};
use bluewake_core::{Catalogue, MacAddress, Preferences, SettingValue, SettingsStore, keys};

use crate::cli::{SettingsArgs, SettingsCommand};
use crate::error::CliError;
use crate::output;

use super::Output;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SettingEntry {
    key: String,
    value: Option<SettingValue>,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&SettingEntry> for SettingRow {
    fn from(e: &SettingEntry) -> Self {
        Self {
            key: e.key.clone(),
            value: e
                .value
                .as_ref()
                .map_or_else(|| "-".into(), ToString::to_string),
        }
    }
}

/// Known keys first, in their canonical order, then anything foreign.
fn entries(store: &SettingsFile) -> Vec<SettingEntry> {
    let stored = store.entries();
    let known = keys::ALL.iter().map(|key| SettingEntry {
        key: (*key).to_owned(),
        value: stored.get(*key).cloned(),
    });
    let foreign = stored
        .iter()
        .filter(|(key, _)| !keys::ALL.contains(&key.as_str()))
        .map(|(key, value)| SettingEntry {
            key: key.clone(),
            value: Some(value.clone()),
        });
    known.chain(foreign).collect()
}

fn known_key(key: &str) -> Result<&'static str, CliError> {
    keys::ALL
        .iter()
        .find(|k| **k == key)
        .copied()
        .ok_or_else(|| CliError::UnknownSetting {
            key: key.to_owned(),
            known: keys::ALL.join(", "),
        })
}

/// Check `raw` against what `key` holds and convert it.
fn parse_value(key: &'static str, raw: &str) -> Result<SettingValue, CliError> {
    if keys::is_flag(key) {
        return SettingValue::from(raw)
            .as_bool()
            .map(SettingValue::Bool)
            .ok_or_else(|| CliError::Validation {
                field: key.into(),
                reason: format!("expected true or false, got '{raw}'"),
            });
    }
    match key {
        keys::RECONNECT_STRATEGY_ID => {
            let catalogue = Catalogue::builtin();
            let strategy = catalogue.get(raw)?;
            Ok(strategy.id.into())
        }
        keys::LAST_CONNECTED_ADDRESS => Ok(MacAddress::parse(raw)?.to_string().into()),
        _ => Ok(raw.into()),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: SettingsArgs, cfg: &Config, out: &Output) -> Result<(), CliError> {
    let store = SettingsFile::open(cfg.settings_path())?;

    match args.command.unwrap_or(SettingsCommand::List) {
        SettingsCommand::List => {
            let entries = entries(&store);
            let rendered = output::render_list(
                out.format,
                &entries,
                |e| SettingRow::from(e),
                |e| format!("{}={}", e.key, SettingRow::from(e).value),
            );
            output::print_output(&rendered, out.quiet);
        }
        SettingsCommand::Get { key } => {
            let key = known_key(&key)?;
            let entry = SettingEntry {
                key: key.to_owned(),
                value: store.read(key),
            };
            let rendered = output::render_single(
                out.format,
                &entry,
                |e| SettingRow::from(e).value,
                |e| SettingRow::from(e).value,
            );
            output::print_output(&rendered, out.quiet);
        }
        SettingsCommand::Set { key, value } => {
            let key = known_key(&key)?;
            let value = parse_value(key, &value)?;
            store.write(key, value);
            store.flush()?;
        }
        SettingsCommand::Unset { key } => {
            let key = known_key(&key)?;
            store.remove(key);
            store.flush()?;
        }
        SettingsCommand::ForgetDevice => Preferences::forget_device(&store)?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_loose_spellings() {
        assert_eq!(
            parse_value(keys::AUTO_RESUME_BT, "on").unwrap(),
            SettingValue::Bool(true)
        );
        assert!(matches!(
            parse_value(keys::AUTO_RESUME_BT, "maybe"),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn strategy_must_exist() {
        assert_eq!(
            parse_value(keys::RECONNECT_STRATEGY_ID, "power_cycle").unwrap(),
            SettingValue::Text("power_cycle".into())
        );
        assert!(matches!(
            parse_value(keys::RECONNECT_STRATEGY_ID, "warp"),
            Err(CliError::NotFound { .. })
        ));
    }

    #[test]
    fn address_is_normalized() {
        assert_eq!(
            parse_value(keys::LAST_CONNECTED_ADDRESS, "e4-17-d8-2a-90-11").unwrap(),
            SettingValue::Text("E4:17:D8:2A:90:11".into())
        );
    }

    #[test]
    fn unknown_key_lists_known_ones() {
        let err = known_key("volume").unwrap_err();
        assert!(matches!(err, CliError::UnknownSetting { ref known, .. } if known.contains("auto_resume_bt")));
    }

    #[test]
    fn listing_keeps_foreign_keys_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "zz_custom = \"x\"\nauto_resume_bt = true\n").unwrap();
        let store = SettingsFile::open(&path).unwrap();

        let listed = entries(&store);
        assert_eq!(listed.len(), keys::ALL.len() + 1);
        assert_eq!(listed[0].key, keys::AUTO_RESUME_BT);
        assert_eq!(listed[0].value, Some(SettingValue::Bool(true)));
        assert_eq!(listed.last().unwrap().key, "zz_custom");
    }
}
