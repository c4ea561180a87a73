// Shared fakes for coordinator integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bluewake_api::{Error, ManagedObject, ObjectPath, Properties, RadioTransport, Value, bluez};
use bluewake_core::{
    CoreConfig, CoreError, Host, MemorySettings, Notification, PowerCoordinator, SettingValue,
    StandbyControl, StepRunner, UiSink, WifiControl, keys,
};

pub const GAMEPAD: &str = "E4:17:D8:2A:90:11";
pub const GAMEPAD_NAME: &str = "8BitDo Micro gamepad";

// ── Radio ───────────────────────────────────────────────────────────

/// How the fake adapter reacts to a power-on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerBehavior {
    Immediate,
    After(Duration),
    Never,
}

#[derive(Debug, Clone)]
struct FakeDevice {
    name: String,
    paired: bool,
    connected: bool,
}

pub struct FakeRadio {
    adapter: ObjectPath,
    powered: Arc<AtomicBool>,
    power_epoch: Arc<AtomicU64>,
    behavior: Mutex<PowerBehavior>,
    devices: Mutex<BTreeMap<String, FakeDevice>>,
    connect_succeeds: AtomicBool,
    unreachable: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl FakeRadio {
    pub fn new(powered: bool) -> Self {
        Self {
            adapter: ObjectPath::new(bluez::DEFAULT_ADAPTER_PATH),
            powered: Arc::new(AtomicBool::new(powered)),
            power_epoch: Arc::new(AtomicU64::new(0)),
            behavior: Mutex::new(PowerBehavior::Immediate),
            devices: Mutex::new(BTreeMap::new()),
            connect_succeeds: AtomicBool::new(true),
            unreachable: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_device(self, address: &str, name: &str, paired: bool) -> Self {
        self.devices.lock().unwrap().insert(
            address.to_owned(),
            FakeDevice {
                name: name.to_owned(),
                paired,
                connected: false,
            },
        );
        self
    }

    pub fn set_behavior(&self, behavior: PowerBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_connect_succeeds(&self, ok: bool) {
        self.connect_succeeds.store(ok, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.devices
            .lock()
            .unwrap()
            .get(address)
            .is_some_and(|d| d.connected)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Log entries matching `entry` exactly.
    pub fn count(&self, entry: &str) -> usize {
        self.log().iter().filter(|e| *e == entry).count()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn check_reachable(&self) -> Result<(), Error> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::CallFailed {
                member: "org.freedesktop.DBus.Properties.Get".into(),
                name: "org.freedesktop.DBus.Error.ServiceUnknown".into(),
                message: "The name org.bluez was not provided by any .service files".into(),
            });
        }
        Ok(())
    }

    fn device_address(&self, path: &ObjectPath) -> Option<String> {
        let element = path.as_str().strip_prefix(self.adapter.as_str())?;
        let hex = element.strip_prefix("/dev_")?;
        Some(hex.replace('_', ":"))
    }

    fn missing(member: &str) -> Error {
        Error::CallFailed {
            member: member.to_owned(),
            name: "org.freedesktop.DBus.Error.UnknownObject".into(),
            message: String::new(),
        }
    }

    fn power(&self, on: bool) {
        let epoch = self.power_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if !on {
            self.powered.store(false, Ordering::SeqCst);
            for device in self.devices.lock().unwrap().values_mut() {
                device.connected = false;
            }
            return;
        }
        match *self.behavior.lock().unwrap() {
            PowerBehavior::Immediate => self.powered.store(true, Ordering::SeqCst),
            PowerBehavior::Never => {}
            PowerBehavior::After(latency) => {
                let powered = Arc::clone(&self.powered);
                let current = Arc::clone(&self.power_epoch);
                tokio::spawn(async move {
                    tokio::time::sleep(latency).await;
                    if current.load(Ordering::SeqCst) == epoch {
                        powered.store(true, Ordering::SeqCst);
                    }
                });
            }
        }
    }
}

impl RadioTransport for FakeRadio {
    async fn get_bool_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
    ) -> Result<bool, Error> {
        self.check_reachable()?;
        if path == &self.adapter && interface == bluez::ADAPTER_INTERFACE && name == "Powered" {
            return Ok(self.is_powered());
        }
        let address = self.device_address(path).ok_or_else(|| Self::missing(name))?;
        let devices = self.devices.lock().unwrap();
        let device = devices.get(&address).ok_or_else(|| Self::missing(name))?;
        match name {
            "Connected" => Ok(device.connected),
            "Paired" => Ok(device.paired),
            _ => Err(Self::missing(name)),
        }
    }

    async fn set_bool_property(
        &self,
        path: &ObjectPath,
        _interface: &str,
        name: &str,
        value: bool,
    ) -> Result<(), Error> {
        self.check_reachable()?;
        self.record(format!("set {name}={value}"));
        if path == &self.adapter && name == "Powered" {
            self.power(value);
            return Ok(());
        }
        Err(Self::missing(name))
    }

    async fn invoke_method(
        &self,
        path: &ObjectPath,
        _interface: &str,
        method: &str,
    ) -> Result<(), Error> {
        self.check_reachable()?;
        if path == &self.adapter {
            self.record(format!("adapter {method}"));
            return Ok(());
        }
        let address = self.device_address(path).ok_or_else(|| Self::missing(method))?;
        self.record(format!("{method} {address}"));

        let powered = self.is_powered();
        let succeeds = self.connect_succeeds.load(Ordering::SeqCst);
        let mut devices = self.devices.lock().unwrap();
        let device = devices
            .get_mut(&address)
            .ok_or_else(|| Self::missing(method))?;
        match method {
            "Connect" if powered && succeeds => {
                device.connected = true;
                Ok(())
            }
            "Connect" => Err(Error::CallFailed {
                member: "org.bluez.Device1.Connect".into(),
                name: "org.bluez.Error.Failed".into(),
                message: "Page Timeout".into(),
            }),
            "Disconnect" => {
                device.connected = false;
                Ok(())
            }
            _ => Err(Self::missing(method)),
        }
    }

    async fn managed_objects(&self) -> Result<Vec<ManagedObject>, Error> {
        self.check_reachable()?;
        let mut objects = vec![ManagedObject {
            path: self.adapter.clone(),
            interfaces: BTreeMap::from([(
                bluez::ADAPTER_INTERFACE.to_owned(),
                Properties::from([("Powered", Value::Bool(self.is_powered()))]),
            )]),
        }];
        for (address, device) in self.devices.lock().unwrap().iter() {
            objects.push(ManagedObject {
                path: self.adapter.child(&format!("dev_{}", address.replace(':', "_"))),
                interfaces: BTreeMap::from([(
                    bluez::DEVICE_INTERFACE.to_owned(),
                    Properties::from([
                        ("Address", Value::Str(address.clone())),
                        ("Name", Value::Str(device.name.clone())),
                        ("Paired", Value::Bool(device.paired)),
                        ("Connected", Value::Bool(device.connected)),
                    ]),
                )]),
            });
        }
        Ok(objects)
    }
}

// ── Host capabilities ───────────────────────────────────────────────

#[derive(Default)]
pub struct FakeWifi {
    on: AtomicBool,
    log: Mutex<Vec<&'static str>>,
}

impl FakeWifi {
    pub fn new(on: bool) -> Self {
        Self {
            on: AtomicBool::new(on),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

impl WifiControl for FakeWifi {
    async fn is_on(&self) -> bool {
        self.on()
    }

    async fn turn_on(&self) -> Result<(), CoreError> {
        self.log.lock().unwrap().push("on");
        self.on.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn turn_off(&self) -> Result<(), CoreError> {
        self.log.lock().unwrap().push("off");
        self.on.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStandby {
    held: AtomicBool,
    pub suppressed: AtomicUsize,
    pub allowed: AtomicUsize,
}

impl FakeStandby {
    pub fn held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

impl StandbyControl for FakeStandby {
    fn suppress(&self) -> Result<(), CoreError> {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn allow(&self) -> Result<(), CoreError> {
        self.allowed.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingUi {
    messages: Mutex<Vec<Notification>>,
}

impl RecordingUi {
    pub fn messages(&self) -> Vec<Notification> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Notification) -> bool) -> usize {
        self.messages().iter().filter(|&n| pred(n)).count()
    }
}

impl UiSink for RecordingUi {
    fn show_message(&self, notification: &Notification) {
        self.messages.lock().unwrap().push(notification.clone());
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub coordinator: PowerCoordinator<FakeRadio, FakeWifi>,
    pub radio: Arc<FakeRadio>,
    pub wifi: Arc<FakeWifi>,
    pub standby: Arc<FakeStandby>,
    pub ui: Arc<RecordingUi>,
    pub settings: Arc<MemorySettings>,
}

pub fn harness(radio: FakeRadio, wifi_on: bool, settings: MemorySettings) -> Harness {
    let radio = Arc::new(radio);
    let wifi = Arc::new(FakeWifi::new(wifi_on));
    let standby = Arc::new(FakeStandby::default());
    let ui = Arc::new(RecordingUi::default());
    let settings = Arc::new(settings);

    let coordinator = PowerCoordinator::new(
        CoreConfig::default(),
        Host {
            transport: Arc::clone(&radio),
            wifi: Arc::clone(&wifi),
            settings: settings.clone(),
            standby: standby.clone(),
            ui: ui.clone(),
            runner: StepRunner::Inline(
                bluewake_core::InlineRunner::new(Arc::clone(&radio)).without_host_processes(),
            ),
        },
    );

    Harness {
        coordinator,
        radio,
        wifi,
        standby,
        ui,
        settings,
    }
}

/// Settings with a remembered gamepad, auto-resume on, and `strategy`.
pub fn remembered(strategy: &str) -> MemorySettings {
    MemorySettings::with([
        (keys::AUTO_RESUME_BT, SettingValue::Bool(true)),
        (keys::LAST_CONNECTED_ADDRESS, GAMEPAD.into()),
        (keys::LAST_CONNECTED_NAME, GAMEPAD_NAME.into()),
        (keys::RECONNECT_STRATEGY_ID, strategy.into()),
    ])
}

pub fn gamepad_radio(powered: bool) -> FakeRadio {
    FakeRadio::new(powered).with_device(GAMEPAD, GAMEPAD_NAME, true)
}

/// Let every timer and spawned task run for `secs` of virtual time.
pub async fn run_for(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
