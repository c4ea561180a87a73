// ── Bluetooth device address ──
//
// Addresses arrive in several spellings: `E4:17:D8:2A:90:11` from device
// properties, `e4-17-d8-2a-90-11` from users, and `dev_E4_17_D8_2A_90_11`
// inside object paths. MacAddress normalizes all of them.

use std::fmt;
use std::str::FromStr;

use bluewake_api::ObjectPath;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Bluetooth address, normalized to upper-case colon form (AA:BB:CC:DD:EE:FF).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse and normalize an address. Accepts colon, dash, or underscore
    /// separators, and bare 12-digit hex.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let raw = raw.as_ref().trim();
        let hex: String = raw
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '_'))
            .collect();

        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidAddress { raw: raw.to_owned() });
        }

        let octets: Vec<String> = hex
            .to_ascii_uppercase()
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect();
        Ok(Self(octets.join(":")))
    }

    /// Recover the address from a device object path (`.../dev_AA_BB_...`).
    pub fn from_object_path(path: &ObjectPath) -> Option<Self> {
        let element = path.as_str().rsplit('/').next()?;
        let hex = element.strip_prefix("dev_")?;
        Self::parse(hex).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object-path element for this device: `dev_AA_BB_CC_DD_EE_FF`.
    pub fn path_element(&self) -> String {
        format!("dev_{}", self.0.replace(':', "_"))
    }

    /// Full device object path below `adapter`.
    pub fn device_path(&self, adapter: &ObjectPath) -> ObjectPath {
        adapter.child(&self.path_element())
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_spellings() {
        for raw in [
            "e4:17:d8:2a:90:11",
            "E4-17-D8-2A-90-11",
            "e417d82a9011",
            " E4_17_D8_2A_90_11 ",
        ] {
            assert_eq!(MacAddress::parse(raw).unwrap().as_str(), "E4:17:D8:2A:90:11");
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(MacAddress::parse("").is_err());
        assert!(MacAddress::parse("E4:17:D8:2A:90").is_err());
        assert!(MacAddress::parse("G4:17:D8:2A:90:11").is_err());
    }

    #[test]
    fn path_round_trip() {
        let adapter = ObjectPath::new("/org/bluez/hci0");
        let mac = MacAddress::parse("5c:b1:3e:00:42:7a").unwrap();
        let path = mac.device_path(&adapter);
        assert_eq!(path.as_str(), "/org/bluez/hci0/dev_5C_B1_3E_00_42_7A");
        assert_eq!(MacAddress::from_object_path(&path), Some(mac));
        assert_eq!(MacAddress::from_object_path(&adapter), None);
    }
}
