// ── Radio transport contract ──
//
// The four calls the power coordinator needs from the radio daemon. Every
// implementation is fire-and-check: success is the absence of an error, and
// only property reads and object enumeration carry a payload.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use crate::error::Error;
use crate::value::Value;

/// Well-known BlueZ names.
pub mod bluez {
    pub const SERVICE: &str = "org.bluez";
    pub const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
    pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";
    pub const DEFAULT_ADAPTER_PATH: &str = "/org/bluez/hci0";
    pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
    pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";
}

// ── ObjectPath ──────────────────────────────────────────────────────

/// A remote object path, e.g. `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn root() -> Self {
        Self("/".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a child element: `/org/bluez/hci0` + `dev_X` → `/org/bluez/hci0/dev_X`.
    pub fn child(&self, element: &str) -> Self {
        if self.0.ends_with('/') {
            Self(format!("{}{element}", self.0))
        } else {
            Self(format!("{}/{element}", self.0))
        }
    }

    /// Whether `self` sits directly below `parent`.
    pub fn is_child_of(&self, parent: &ObjectPath) -> bool {
        self.0
            .strip_prefix(parent.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Properties / ManagedObject ──────────────────────────────────────

/// Property map of one interface on one object, with variants already unwrapped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Value>> for Properties {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<const N: usize> From<[(&str, Value); N]> for Properties {
    fn from(entries: [(&str, Value); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        )
    }
}

/// One entry of an object-manager enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    pub path: ObjectPath,
    pub interfaces: BTreeMap<String, Properties>,
}

impl ManagedObject {
    pub fn interface(&self, name: &str) -> Option<&Properties> {
        self.interfaces.get(name)
    }
}

// ── RadioTransport ──────────────────────────────────────────────────

/// Remote calls against the radio daemon.
///
/// Implementations must never block the caller's executor: slow work is
/// expected to run out of process and be awaited.
pub trait RadioTransport: Send + Sync + 'static {
    fn get_bool_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
    ) -> impl Future<Output = Result<bool, Error>> + Send;

    fn set_bool_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        value: bool,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn invoke_method(
        &self,
        path: &ObjectPath,
        interface: &str,
        method: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn managed_objects(&self) -> impl Future<Output = Result<Vec<ManagedObject>, Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths() {
        let adapter = ObjectPath::new(bluez::DEFAULT_ADAPTER_PATH);
        let dev = adapter.child("dev_AA_BB_CC_DD_EE_FF");
        assert_eq!(dev.as_str(), "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        assert!(dev.is_child_of(&adapter));
        assert!(!adapter.is_child_of(&adapter));
        assert!(!dev.child("sep1").is_child_of(&adapter));
        assert_eq!(ObjectPath::root().child("x").as_str(), "/x");
    }

    #[test]
    fn properties_accessors_unwrap_types() {
        let props = Properties::from([
            ("Paired", Value::Bool(true)),
            ("Name", Value::Str("Remote".into())),
        ]);
        assert_eq!(props.bool("Paired"), Some(true));
        assert_eq!(props.str("Name"), Some("Remote"));
        assert_eq!(props.bool("Name"), None);
        assert_eq!(props.str("Missing"), None);
    }
}
