// ── Reconnect strategies ──
//
// A strategy is a named recipe: how long to wait after the radio comes back,
// and which steps bring a remembered device back. Recipes are templates;
// `plan()` resolves them against a device address, the adapter path, and
// the configured host processes.

use std::fmt;
use std::time::Duration;

use bluewake_api::{ObjectPath, bluez};
use serde::Serialize;

use crate::config::{ProcessSpec, ProcessTable};
use crate::error::CoreError;
use crate::model::MacAddress;

/// Delay before an automatic reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i64")]
pub enum ReconnectDelay {
    /// Never reconnect automatically.
    Manual,
    After(Duration),
}

impl ReconnectDelay {
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Manual => None,
            Self::After(d) => Some(d),
        }
    }
}

/// Milliseconds, with `-1` for manual.
impl From<ReconnectDelay> for i64 {
    fn from(delay: ReconnectDelay) -> Self {
        match delay {
            ReconnectDelay::Manual => -1,
            ReconnectDelay::After(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for ReconnectDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::After(d) => write!(f, "{}s", d.as_secs_f64()),
        }
    }
}

/// Which of the two configured host processes a step refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    BluetoothDaemon,
    FirmwareLoader,
}

impl ProcessRole {
    fn resolve(self, table: &ProcessTable) -> &ProcessSpec {
        match self {
            Self::BluetoothDaemon => &table.bluetooth_daemon,
            Self::FirmwareLoader => &table.firmware_loader,
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BluetoothDaemon => "bluetooth daemon",
            Self::FirmwareLoader => "firmware loader",
        })
    }
}

/// One step of a recipe, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTemplate {
    AdapterPower(bool),
    AdapterCall(&'static str),
    DeviceCall(&'static str),
    Sleep(Duration),
    Kill(ProcessRole),
    Spawn(ProcessRole),
}

impl fmt::Display for StepTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterPower(true) => f.write_str("power on"),
            Self::AdapterPower(false) => f.write_str("power off"),
            Self::AdapterCall(method) => write!(f, "adapter {method}"),
            Self::DeviceCall(method) => write!(f, "device {method}"),
            Self::Sleep(d) => write!(f, "sleep {}s", d.as_secs_f64()),
            Self::Kill(role) => write!(f, "kill {role}"),
            Self::Spawn(role) => write!(f, "start {role}"),
        }
    }
}

/// A concrete step, ready for a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    SetProperty {
        path: ObjectPath,
        interface: String,
        name: String,
        value: bool,
    },
    Invoke {
        path: ObjectPath,
        interface: String,
        method: String,
    },
    Sleep(Duration),
    Kill { name: String },
    SpawnDetached { command: Vec<String> },
}

/// A named reconnect recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectStrategy {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub delay: ReconnectDelay,
    #[serde(skip)]
    pub steps: Vec<StepTemplate>,
}

impl ReconnectStrategy {
    pub fn is_manual(&self) -> bool {
        self.delay == ReconnectDelay::Manual
    }

    /// Human-readable step summary, e.g. `connect → sleep 2s → connect`.
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Resolve the recipe for one device.
    pub fn plan(
        &self,
        address: &MacAddress,
        adapter: &ObjectPath,
        processes: &ProcessTable,
    ) -> Vec<Step> {
        let device = address.device_path(adapter);
        self.steps
            .iter()
            .map(|step| match *step {
                StepTemplate::AdapterPower(value) => Step::SetProperty {
                    path: adapter.clone(),
                    interface: bluez::ADAPTER_INTERFACE.into(),
                    name: "Powered".into(),
                    value,
                },
                StepTemplate::AdapterCall(method) => Step::Invoke {
                    path: adapter.clone(),
                    interface: bluez::ADAPTER_INTERFACE.into(),
                    method: method.into(),
                },
                StepTemplate::DeviceCall(method) => Step::Invoke {
                    path: device.clone(),
                    interface: bluez::DEVICE_INTERFACE.into(),
                    method: method.into(),
                },
                StepTemplate::Sleep(d) => Step::Sleep(d),
                StepTemplate::Kill(role) => Step::Kill {
                    name: role.resolve(processes).name.clone(),
                },
                StepTemplate::Spawn(role) => Step::SpawnDetached {
                    command: role.resolve(processes).command.clone(),
                },
            })
            .collect()
    }
}

// ── Catalogue ───────────────────────────────────────────────────────

pub const DEFAULT_STRATEGY: &str = "short";

const CONNECT: StepTemplate = StepTemplate::DeviceCall("Connect");

const fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// The built-in strategies, in menu order.
#[derive(Debug, Clone)]
pub struct Catalogue {
    strategies: Vec<ReconnectStrategy>,
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalogue {
    pub fn builtin() -> Self {
        use StepTemplate::{AdapterCall, AdapterPower, Kill, Sleep, Spawn};

        let strategies = vec![
            ReconnectStrategy {
                id: "manual",
                label: "Manual",
                description: "Never reconnect automatically",
                delay: ReconnectDelay::Manual,
                steps: vec![CONNECT],
            },
            ReconnectStrategy {
                id: "short",
                label: "Quick",
                description: "Connect once, one second after the radio comes up",
                delay: ReconnectDelay::After(secs(1)),
                steps: vec![CONNECT],
            },
            ReconnectStrategy {
                id: "standard",
                label: "Standard",
                description: "Connect, wait, and connect again",
                delay: ReconnectDelay::After(secs(3)),
                steps: vec![CONNECT, Sleep(secs(2)), CONNECT],
            },
            ReconnectStrategy {
                id: "rediscover",
                label: "Rediscover",
                description: "Scan briefly so the device is seen again, then connect",
                delay: ReconnectDelay::After(secs(3)),
                steps: vec![
                    AdapterCall("StartDiscovery"),
                    Sleep(secs(4)),
                    AdapterCall("StopDiscovery"),
                    CONNECT,
                ],
            },
            ReconnectStrategy {
                id: "power_cycle",
                label: "Power cycle",
                description: "Turn the adapter off and on, then connect",
                delay: ReconnectDelay::After(secs(2)),
                steps: vec![
                    AdapterPower(false),
                    Sleep(secs(1)),
                    AdapterPower(true),
                    Sleep(secs(2)),
                    CONNECT,
                ],
            },
            ReconnectStrategy {
                id: "restart_daemon",
                label: "Restart daemon",
                description: "Restart the bluetooth daemon, then connect",
                delay: ReconnectDelay::After(secs(2)),
                steps: vec![
                    Kill(ProcessRole::BluetoothDaemon),
                    Spawn(ProcessRole::BluetoothDaemon),
                    Sleep(secs(3)),
                    AdapterPower(true),
                    Sleep(secs(2)),
                    CONNECT,
                ],
            },
            ReconnectStrategy {
                id: "reload_firmware",
                label: "Reload firmware",
                description: "Restart the firmware loader and the daemon, then connect",
                delay: ReconnectDelay::After(secs(2)),
                steps: vec![
                    Kill(ProcessRole::FirmwareLoader),
                    Spawn(ProcessRole::FirmwareLoader),
                    Sleep(secs(5)),
                    Kill(ProcessRole::BluetoothDaemon),
                    Spawn(ProcessRole::BluetoothDaemon),
                    Sleep(secs(3)),
                    AdapterPower(true),
                    Sleep(secs(2)),
                    CONNECT,
                ],
            },
        ];
        Self { strategies }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReconnectStrategy> {
        self.strategies.iter()
    }

    pub fn get(&self, id: &str) -> Result<&ReconnectStrategy, CoreError> {
        self.strategies
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CoreError::UnknownStrategy { id: id.to_owned() })
    }

    pub fn default_strategy(&self) -> &ReconnectStrategy {
        // `builtin()` always contains the default id.
        self.strategies
            .iter()
            .find(|s| s.id == DEFAULT_STRATEGY)
            .unwrap_or(&self.strategies[0])
    }

    /// Stored id if it names a strategy, the default otherwise.
    pub fn select(&self, id: Option<&str>) -> &ReconnectStrategy {
        id.and_then(|id| self.get(id).ok())
            .unwrap_or_else(|| self.default_strategy())
    }
}
