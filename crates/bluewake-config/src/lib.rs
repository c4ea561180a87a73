//! Shared configuration for the bluewake binary.
//!
//! TOML config file plus `BLUEWAKE_` environment overrides, loaded through
//! figment, and translation to `bluewake_core::CoreConfig`. Also home of
//! [`SettingsFile`], the on-disk `SettingsStore` for user preferences.

mod settings;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bluewake_api::{Bus, ObjectPath, TransportConfig, bluez};
use bluewake_core::{CoreConfig, DbusSendCommand, ProcessSpec, ProcessTable, RetryPolicy};

pub use settings::SettingsFile;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "BLUEWAKE_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub wifi: WifiSection,
    #[serde(default)]
    pub standby: StandbySection,
    #[serde(default)]
    pub firmware: FirmwareSection,
    #[serde(default)]
    pub settings: SettingsSection,
    #[serde(default)]
    pub daemon: DaemonSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// How radio calls are made.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportSection {
    /// `dbus-send` binary used by strategy scripts.
    pub program: PathBuf,
    pub service: String,
    /// "system" or "session".
    pub bus: String,
    /// Explicit bus address, e.g. `unix:path=/run/dbus/system_bus_socket`.
    pub address: Option<String>,
    pub adapter: String,
    /// Per-call deadline.
    pub timeout_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dbus-send"),
            service: bluez::SERVICE.into(),
            bus: "system".into(),
            address: None,
            adapter: bluez::DEFAULT_ADAPTER_PATH.into(),
            timeout_ms: 5_000,
        }
    }
}

/// Polling budgets and delays, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingSection {
    pub enable_interval_ms: u64,
    pub enable_attempts: u32,
    pub wifi_interval_ms: u64,
    pub wifi_attempts: u32,
    pub verify_settle_ms: u64,
    pub startup_grace_ms: u64,
    /// How long to wait for a strategy script before verifying anyway.
    pub strategy_ceiling_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            enable_interval_ms: 100,
            enable_attempts: 30,
            wifi_interval_ms: 500,
            wifi_attempts: 20,
            verify_settle_ms: 2_000,
            startup_grace_ms: 5_000,
            strategy_ceiling_ms: 60_000,
        }
    }
}

/// WiFi control through the network interface and shell commands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WifiSection {
    pub interface: String,
    pub on_command: Vec<String>,
    pub off_command: Vec<String>,
}

impl Default for WifiSection {
    fn default() -> Self {
        Self {
            interface: "wlan0".into(),
            on_command: vec!["ifconfig".into(), "wlan0".into(), "up".into()],
            off_command: vec!["ifconfig".into(), "wlan0".into(), "down".into()],
        }
    }
}

/// Standby suppression through a kernel wake lock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StandbySection {
    pub enabled: bool,
    pub lock_path: PathBuf,
    pub unlock_path: PathBuf,
    pub lock_name: String,
}

impl Default for StandbySection {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_path: PathBuf::from("/sys/power/wake_lock"),
            unlock_path: PathBuf::from("/sys/power/wake_unlock"),
            lock_name: "bluewake".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProcessSection {
    pub name: String,
    pub command: Vec<String>,
}

impl From<&ProcessSpec> for ProcessSection {
    fn from(spec: &ProcessSpec) -> Self {
        Self {
            name: spec.name.clone(),
            command: spec.command.clone(),
        }
    }
}

impl From<&ProcessSection> for ProcessSpec {
    fn from(section: &ProcessSection) -> Self {
        ProcessSpec::new(section.name.clone(), section.command.iter().cloned())
    }
}

/// Processes restarted by the heavier reconnect strategies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FirmwareSection {
    pub bluetooth_daemon: ProcessSection,
    pub firmware_loader: ProcessSection,
}

impl Default for FirmwareSection {
    fn default() -> Self {
        let table = ProcessTable::default();
        Self {
            bluetooth_daemon: (&table.bluetooth_daemon).into(),
            firmware_loader: (&table.firmware_loader).into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsSection {
    /// Preferences file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonSection {
    /// Control socket for `bluewake suspend` / `bluewake resume`.
    /// Defaults to the platform runtime directory.
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSection {
    /// Daemon log file. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
    pub json: bool,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "bluewake", "bluewake")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("bluewake");
    p
}

/// Resolve the config file path: `BLUEWAKE_CONFIG`, then platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

impl Config {
    /// Preferences file: configured path, or `settings.toml` in the data dir.
    pub fn settings_path(&self) -> PathBuf {
        if let Some(ref path) = self.settings.path {
            return path.clone();
        }
        project_dirs().map_or_else(
            || dirs_fallback().join("settings.toml"),
            |dirs| dirs.data_dir().join("settings.toml"),
        )
    }

    /// Daemon control socket: configured path, or `bluewake.sock` in the
    /// runtime dir (data dir where there is none).
    pub fn socket_path(&self) -> PathBuf {
        if let Some(ref path) = self.daemon.socket {
            return path.clone();
        }
        project_dirs().map_or_else(
            || dirs_fallback().join("bluewake.sock"),
            |dirs| {
                dirs.runtime_dir()
                    .unwrap_or_else(|| dirs.data_dir())
                    .join("bluewake.sock")
            },
        )
    }
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from the default file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) + environment, then validate.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BLUEWAKE_").ignore(&["CONFIG"]).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Serialize config to TOML and write to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation and translation ──────────────────────────────────────

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bus()?;
        if self.transport.program.as_os_str().is_empty() {
            return Err(invalid("transport.program", "must not be empty"));
        }
        if !self.transport.adapter.starts_with('/') {
            return Err(invalid(
                "transport.adapter",
                format!("'{}' is not an object path", self.transport.adapter),
            ));
        }
        if self.transport.address.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("transport.address", "must not be empty when set"));
        }
        if self.transport.timeout_ms == 0 {
            return Err(invalid("transport.timeout_ms", "must be positive"));
        }
        if self.timing.enable_attempts == 0 || self.timing.wifi_attempts == 0 {
            return Err(invalid("timing", "attempt counts must be positive"));
        }
        for (field, process) in [
            ("firmware.bluetooth_daemon", &self.firmware.bluetooth_daemon),
            ("firmware.firmware_loader", &self.firmware.firmware_loader),
        ] {
            if process.name.is_empty() || process.command.is_empty() {
                return Err(invalid(field, "name and command are required"));
            }
        }
        Ok(())
    }

    fn bus(&self) -> Result<Bus, ConfigError> {
        match self.transport.bus.as_str() {
            "system" => Ok(Bus::System),
            "session" => Ok(Bus::Session),
            other => Err(invalid(
                "transport.bus",
                format!("expected 'system' or 'session', got '{other}'"),
            )),
        }
    }

    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        Ok(TransportConfig {
            service: self.transport.service.clone(),
            bus: self.bus()?,
            address: self.transport.address.clone(),
            timeout: Duration::from_millis(self.transport.timeout_ms),
        })
    }

    /// How strategy scripts call the radio.
    pub fn dbus_send(&self) -> Result<DbusSendCommand, ConfigError> {
        Ok(DbusSendCommand {
            program: self.transport.program.clone(),
            service: self.transport.service.clone(),
            bus: self.bus()?,
            reply_timeout: Duration::from_millis(self.transport.timeout_ms),
        })
    }

    pub fn strategy_ceiling(&self) -> Duration {
        Duration::from_millis(self.timing.strategy_ceiling_ms)
    }

    /// Build a `CoreConfig`; core never reads config files itself.
    pub fn core_config(&self) -> CoreConfig {
        let t = &self.timing;
        CoreConfig {
            adapter_path: ObjectPath::new(self.transport.adapter.clone()),
            enable_policy: RetryPolicy::new(
                Duration::from_millis(t.enable_interval_ms),
                t.enable_attempts,
            ),
            wifi_policy: RetryPolicy::new(
                Duration::from_millis(t.wifi_interval_ms),
                t.wifi_attempts,
            ),
            verify_settle: Duration::from_millis(t.verify_settle_ms),
            startup_grace: Duration::from_millis(t.startup_grace_ms),
            processes: ProcessTable {
                bluetooth_daemon: (&self.firmware.bluetooth_daemon).into(),
                firmware_loader: (&self.firmware.firmware_loader).into(),
            },
        }
    }
}
