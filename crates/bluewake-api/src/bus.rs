// ── Message-bus transport ──
//
// Radio calls go straight to the BlueZ daemon over a zbus connection. The
// connection is opened lazily on the first call and reused afterwards; a
// failed connect is not cached, so the next call tries again. Every call
// runs under the configured deadline.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, trace};
use zbus::{Connection, Message};
use zbus::fdo::ManagedObjects;
use zbus::zvariant::{self, OwnedValue};

use crate::error::Error;
use crate::transport::{ManagedObject, ObjectPath, Properties, RadioTransport, bluez};
use crate::value::Value;

/// Which message bus to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bus {
    #[default]
    System,
    Session,
}

impl Bus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Session => "session",
        }
    }
}

/// Shared transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Destination service name.
    pub service: String,
    pub bus: Bus,
    /// Explicit bus address (`unix:path=...`). Overrides `bus` when set.
    pub address: Option<String>,
    /// Deadline for a single call, including connection set-up.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            service: bluez::SERVICE.into(),
            bus: Bus::System,
            address: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// [`RadioTransport`] over a D-Bus connection.
#[derive(Debug)]
pub struct BusClient {
    config: TransportConfig,
    conn: OnceCell<Connection>,
}

impl BusClient {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            conn: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    fn bus_label(&self) -> String {
        self.config
            .address
            .clone()
            .unwrap_or_else(|| self.config.bus.as_str().to_owned())
    }

    async fn open(&self) -> Result<Connection, Error> {
        let connect = |source| Error::Connect {
            bus: self.bus_label(),
            source,
        };
        let builder = match (&self.config.address, self.config.bus) {
            (Some(address), _) => zbus::connection::Builder::address(address.as_str()),
            (None, Bus::System) => zbus::connection::Builder::system(),
            (None, Bus::Session) => zbus::connection::Builder::session(),
        }
        .map_err(connect)?;

        debug!(bus = %self.bus_label(), "connecting to message bus");
        tokio::time::timeout(self.config.timeout, builder.build())
            .await
            .map_err(|_| Error::Timeout {
                member: "connect".into(),
                timeout_ms: self.timeout_ms(),
            })?
            .map_err(connect)
    }

    async fn connection(&self) -> Result<&Connection, Error> {
        self.conn.get_or_try_init(|| self.open()).await
    }

    /// Call `interface.method` on `path` and return the raw reply.
    async fn call<B>(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        body: &B,
    ) -> Result<Message, Error>
    where
        B: serde::Serialize + zvariant::DynamicType,
    {
        let member = format!("{interface}.{method}");
        trace!(%member, path, "bus call");
        let conn = self.connection().await?;

        self.deadline(
            &member,
            conn.call_method(Some(self.config.service.as_str()), path, Some(interface), method, body),
        )
        .await?
        .map_err(|source| Error::from_call(&member, source))
    }

    /// Like [`call`](Self::call), deserializing the reply body.
    async fn query<B, R>(&self, path: &str, interface: &str, method: &str, body: &B) -> Result<R, Error>
    where
        B: serde::Serialize + zvariant::DynamicType,
        R: for<'d> zvariant::DynamicDeserialize<'d>,
    {
        let reply = self.call(path, interface, method, body).await?;
        reply
            .body()
            .deserialize::<R>()
            .map_err(|source| Error::from_call(&format!("{interface}.{method}"), source))
    }

    async fn deadline<F: Future>(&self, member: &str, call: F) -> Result<F::Output, Error> {
        tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| Error::Timeout {
                member: member.to_owned(),
                timeout_ms: self.timeout_ms(),
            })
    }
}

/// Flatten a `GetManagedObjects` reply into sorted records.
pub fn managed_objects_from(raw: &ManagedObjects) -> Vec<ManagedObject> {
    let mut objects: Vec<ManagedObject> = raw
        .iter()
        .map(|(path, interfaces)| ManagedObject {
            path: ObjectPath::new(path.as_str()),
            interfaces: interfaces
                .iter()
                .map(|(name, props)| {
                    let props: BTreeMap<String, Value> = props
                        .iter()
                        .map(|(key, value)| (key.clone(), Value::from(value)))
                        .collect();
                    (name.as_str().to_owned(), Properties::from(props))
                })
                .collect(),
        })
        .collect();
    objects.sort_by(|a, b| a.path.cmp(&b.path));
    objects
}

impl RadioTransport for BusClient {
    async fn get_bool_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
    ) -> Result<bool, Error> {
        let value: OwnedValue = self
            .query(path.as_str(), bluez::PROPERTIES_INTERFACE, "Get", &(interface, name))
            .await?;
        Value::from(&value)
            .as_bool()
            .ok_or_else(|| Error::UnexpectedReply {
                member: format!("{interface}.{name}"),
                expected: "boolean",
            })
    }

    async fn set_bool_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        value: bool,
    ) -> Result<(), Error> {
        self.call(
            path.as_str(),
            bluez::PROPERTIES_INTERFACE,
            "Set",
            &(interface, name, zvariant::Value::from(value)),
        )
        .await
        .map(drop)
    }

    async fn invoke_method(
        &self,
        path: &ObjectPath,
        interface: &str,
        method: &str,
    ) -> Result<(), Error> {
        self.call(path.as_str(), interface, method, &())
            .await
            .map(drop)
    }

    async fn managed_objects(&self) -> Result<Vec<ManagedObject>, Error> {
        let raw: ManagedObjects = self
            .query("/", bluez::OBJECT_MANAGER_INTERFACE, "GetManagedObjects", &())
            .await?;
        Ok(managed_objects_from(&raw))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_bus_is_unreachable() {
        let client = BusClient::new(TransportConfig {
            address: Some("unix:path=/nonexistent/bluewake-test-bus".into()),
            timeout: Duration::from_millis(500),
            ..TransportConfig::default()
        });
        let err = client.managed_objects().await.unwrap_err();
        assert!(err.is_unreachable(), "expected connect failure, got {err:?}");
    }

    #[test]
    fn bus_label_names_the_bus() {
        let client = BusClient::new(TransportConfig {
            bus: Bus::Session,
            ..TransportConfig::default()
        });
        assert_eq!(client.bus_label(), "session");
    }
}
