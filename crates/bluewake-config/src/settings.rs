// ── Preferences file ──
//
// A flat TOML table of preference keys. Writes stay in memory until
// `flush`, which replaces the file atomically (temp file + rename).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bluewake_core::{CoreError, SettingValue, SettingsStore};

use crate::ConfigError;

#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    values: BTreeMap<String, SettingValue>,
    dirty: bool,
}

impl SettingsFile {
    /// Open `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => parse(&path, &text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(State {
                values,
                dirty: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> BTreeMap<String, SettingValue> {
        self.lock().values.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, values: &BTreeMap<String, SettingValue>) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(values)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Booleans stay booleans, strings stay strings; anything else is kept as
/// its TOML text.
fn parse(path: &Path, text: &str) -> Result<BTreeMap<String, SettingValue>, ConfigError> {
    let table: toml::Table = text.parse().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::Boolean(b) => SettingValue::Bool(b),
                toml::Value::String(s) => SettingValue::Text(s),
                other => SettingValue::Text(other.to_string()),
            };
            (key, value)
        })
        .collect())
}

impl SettingsStore for SettingsFile {
    fn read(&self, key: &str) -> Option<SettingValue> {
        self.lock().values.get(key).cloned()
    }

    fn write(&self, key: &str, value: SettingValue) {
        let mut state = self.lock();
        if state.values.get(key) != Some(&value) {
            state.values.insert(key.to_owned(), value);
            state.dirty = true;
        }
    }

    fn remove(&self, key: &str) {
        let mut state = self.lock();
        if state.values.remove(key).is_some() {
            state.dirty = true;
        }
    }

    fn flush(&self) -> Result<(), CoreError> {
        let mut state = self.lock();
        if !state.dirty {
            return Ok(());
        }
        self.persist(&state.values)
            .map_err(|e| CoreError::Settings {
                message: format!("{}: {e}", self.path.display()),
            })?;
        state.dirty = false;
        Ok(())
    }
}
