// ── Device domain type ──

use std::cmp::Ordering;

use bluewake_api::{ManagedObject, ObjectPath, bluez};
use serde::Serialize;

use super::MacAddress;

/// A remote device known to the radio daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub address: MacAddress,
    /// Advertised name, or the alias if the device never sent one.
    pub name: Option<String>,
    pub paired: bool,
    pub trusted: bool,
    pub connected: bool,
    pub rssi: Option<i16>,
    #[serde(skip)]
    pub path: ObjectPath,
}

impl Device {
    /// Build from an object-manager entry. Returns `None` for objects
    /// without a device interface or without a recognizable address.
    pub fn from_managed(object: &ManagedObject) -> Option<Self> {
        let props = object.interface(bluez::DEVICE_INTERFACE)?;
        let address = props
            .str("Address")
            .and_then(|raw| MacAddress::parse(raw).ok())
            .or_else(|| MacAddress::from_object_path(&object.path))?;

        let name = props
            .str("Name")
            .or_else(|| props.str("Alias"))
            .filter(|n| !n.is_empty() && *n != address.as_str().replace(':', "-"))
            .map(ToOwned::to_owned);

        let rssi = props
            .get("RSSI")
            .and_then(|v| match v {
                bluewake_api::Value::Int(i) => i16::try_from(*i).ok(),
                _ => None,
            });

        Some(Self {
            address,
            name,
            paired: props.bool("Paired").unwrap_or(false),
            trusted: props.bool("Trusted").unwrap_or(false),
            connected: props.bool("Connected").unwrap_or(false),
            rssi,
            path: object.path.clone(),
        })
    }

    /// Name if known, address otherwise.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.address.as_str())
    }

    /// Menu label: name plus a connection marker.
    pub fn label(&self) -> String {
        let marker = if self.connected {
            " (connected)"
        } else if self.paired {
            " (paired)"
        } else {
            ""
        };
        format!("{}{marker}", self.display_name())
    }

    /// Listing order: connected first, then paired, then by name.
    pub fn listing_order(a: &Self, b: &Self) -> Ordering {
        b.connected
            .cmp(&a.connected)
            .then(b.paired.cmp(&a.paired))
            .then_with(|| {
                a.display_name()
                    .to_lowercase()
                    .cmp(&b.display_name().to_lowercase())
            })
    }
}
