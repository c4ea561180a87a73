// ── Runtime coordinator configuration ──
//
// These types describe *how* the coordinator paces itself and which host
// processes the heavier reconnect strategies restart. They never touch disk:
// the binary loads its config file and hands a `CoreConfig` in.

use std::time::Duration;

use bluewake_api::{ObjectPath, bluez};
use serde::Serialize;

use crate::poll::RetryPolicy;

/// A host process that a reconnect strategy may kill and respawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSpec {
    /// Process name as matched by `killall`.
    pub name: String,
    /// Program and arguments used to respawn it, detached.
    pub command: Vec<String>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
        }
    }
}

/// The two processes behind the radio stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessTable {
    pub bluetooth_daemon: ProcessSpec,
    pub firmware_loader: ProcessSpec,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            bluetooth_daemon: ProcessSpec::new(
                "bluetoothd",
                ["/usr/libexec/bluetooth/bluetoothd", "-n"],
            ),
            firmware_loader: ProcessSpec::new(
                "wmt_launcher",
                ["/usr/bin/wmt_launcher", "-p", "/etc/firmware/"],
            ),
        }
    }
}

/// Configuration for a single coordinator instance.
///
/// Built by the binary, passed to `PowerCoordinator`.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Adapter object path (defaults to `/org/bluez/hci0`).
    pub adapter_path: ObjectPath,
    /// Enable confirmation: 100 ms × 30 by default.
    pub enable_policy: RetryPolicy,
    /// WiFi bring-up while enabling: 500 ms × 20 by default.
    pub wifi_policy: RetryPolicy,
    /// Wait between a strategy finishing and the connected-state check.
    pub verify_settle: Duration,
    /// Delay before the launch-time reconnect, so the host UI can settle.
    pub startup_grace: Duration,
    /// Processes restarted by the daemon and firmware strategies.
    pub processes: ProcessTable,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            adapter_path: ObjectPath::new(bluez::DEFAULT_ADAPTER_PATH),
            enable_policy: RetryPolicy::new(Duration::from_millis(100), 30),
            wifi_policy: RetryPolicy::new(Duration::from_millis(500), 20),
            verify_settle: Duration::from_secs(2),
            startup_grace: Duration::from_secs(5),
            processes: ProcessTable::default(),
        }
    }
}
