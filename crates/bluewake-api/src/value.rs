// ── Property values ──
//
// An owned, lifetime-free mirror of `zvariant::Value`. Everything above the
// transport reads properties through this type, so the core never depends
// on zbus directly.

use serde::Serialize;
use zbus::zvariant;

/// A decoded D-Bus value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    ObjectPath(String),
    Signature(String),
    Bool(bool),
    Byte(u8),
    Int(i64),
    UInt(u64),
    Double(f64),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Struct(Vec<Value>),
    Variant(Box<Value>),
    /// A type the radio never sends for the properties we read (file
    /// descriptors, maybe-types). Keeps its signature for logging.
    Other(String),
}

impl Value {
    /// Strip any number of variant wrappers.
    pub fn unwrap_variant(&self) -> &Value {
        match self {
            Self::Variant(inner) => inner.unwrap_variant(),
            other => other,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unwrap_variant() {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String-like payloads: plain strings, object paths and signatures.
    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_variant() {
            Self::Str(s) | Self::ObjectPath(s) | Self::Signature(s) => Some(s),
            _ => None,
        }
    }

    /// Signed or unsigned integers that fit an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self.unwrap_variant() {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            Self::Byte(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Dictionary entries. An empty array counts as an empty dictionary.
    pub fn as_dict(&self) -> Option<&[(Value, Value)]> {
        match self.unwrap_variant() {
            Self::Dict(entries) => Some(entries),
            Self::Array(items) if items.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

impl From<&zvariant::Value<'_>> for Value {
    fn from(value: &zvariant::Value<'_>) -> Self {
        match value {
            zvariant::Value::Bool(b) => Self::Bool(*b),
            zvariant::Value::U8(b) => Self::Byte(*b),
            zvariant::Value::I16(i) => Self::Int(i64::from(*i)),
            zvariant::Value::I32(i) => Self::Int(i64::from(*i)),
            zvariant::Value::I64(i) => Self::Int(*i),
            zvariant::Value::U16(u) => Self::UInt(u64::from(*u)),
            zvariant::Value::U32(u) => Self::UInt(u64::from(*u)),
            zvariant::Value::U64(u) => Self::UInt(*u),
            zvariant::Value::F64(f) => Self::Double(*f),
            zvariant::Value::Str(s) => Self::Str(s.as_str().to_owned()),
            zvariant::Value::ObjectPath(p) => Self::ObjectPath(p.as_str().to_owned()),
            zvariant::Value::Signature(s) => Self::Signature(s.to_string()),
            zvariant::Value::Value(inner) => Self::Variant(Box::new(Self::from(inner.as_ref()))),
            zvariant::Value::Array(array) => {
                let items: Vec<Value> = array.iter().map(Self::from).collect();
                if array.element_signature().to_string() == "y" {
                    Self::Bytes(
                        items
                            .iter()
                            .filter_map(|v| match v {
                                Self::Byte(b) => Some(*b),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Self::Array(items)
                }
            }
            zvariant::Value::Dict(dict) => Self::Dict(
                dict.iter()
                    .map(|(k, v)| (Self::from(k), Self::from(v)))
                    .collect(),
            ),
            zvariant::Value::Structure(s) => Self::Struct(s.fields().iter().map(Self::from).collect()),
            other => Self::Other(other.value_signature().to_string()),
        }
    }
}

impl From<&zvariant::OwnedValue> for Value {
    fn from(value: &zvariant::OwnedValue) -> Self {
        let value: &zvariant::Value<'_> = value;
        Self::from(value)
    }
}
