// ── Device directory ──
//
// Enumerates remote devices below the adapter, caches the last listing for
// menus, and issues connect/disconnect requests. A successful connect
// becomes the reconnect target.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bluewake_api::{ObjectPath, RadioTransport, bluez};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{Device, MacAddress};
use crate::prefs::{Preferences, SettingsStore};

pub struct DeviceDirectory<T> {
    inner: Arc<DirectoryInner<T>>,
}

struct DirectoryInner<T> {
    transport: Arc<T>,
    adapter: ObjectPath,
    settings: Arc<dyn SettingsStore>,
    last_listing: Mutex<Arc<Vec<Device>>>,
}

impl<T> Clone for DeviceDirectory<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RadioTransport> DeviceDirectory<T> {
    pub fn new(transport: Arc<T>, adapter: ObjectPath, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                transport,
                adapter,
                settings,
                last_listing: Mutex::new(Arc::new(Vec::new())),
            }),
        }
    }

    pub fn adapter_path(&self) -> &ObjectPath {
        &self.inner.adapter
    }

    /// All devices below the adapter, connected first.
    pub async fn list(&self) -> Result<Vec<Device>, CoreError> {
        let objects = self.inner.transport.managed_objects().await?;
        let mut devices: Vec<Device> = objects
            .iter()
            .filter(|o| o.path.is_child_of(&self.inner.adapter))
            .filter_map(Device::from_managed)
            .collect();
        devices.sort_by(Device::listing_order);
        debug!(count = devices.len(), "listed devices");

        *self
            .inner
            .last_listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(devices.clone());
        Ok(devices)
    }

    pub async fn paired(&self) -> Result<Vec<Device>, CoreError> {
        Ok(self.list().await?.into_iter().filter(|d| d.paired).collect())
    }

    /// Most recent result of [`list`](Self::list), without a radio call.
    pub fn last_listing(&self) -> Arc<Vec<Device>> {
        Arc::clone(
            &self
                .inner
                .last_listing
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    pub async fn find(&self, address: &MacAddress) -> Result<Device, CoreError> {
        self.list()
            .await?
            .into_iter()
            .find(|d| &d.address == address)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: address.to_string(),
            })
    }

    /// Whether `address` is currently connected. Transport failures read
    /// as not connected.
    pub async fn is_connected(&self, address: &MacAddress) -> bool {
        let path = address.device_path(&self.inner.adapter);
        match self
            .inner
            .transport
            .get_bool_property(&path, bluez::DEVICE_INTERFACE, "Connected")
            .await
        {
            Ok(connected) => connected,
            Err(e) => {
                debug!(%address, error = %e, "connected-state query failed");
                false
            }
        }
    }

    /// Connect to a known device and remember it as the reconnect target.
    pub async fn connect(&self, address: &MacAddress) -> Result<Device, CoreError> {
        let device = self.find(address).await?;
        info!(%address, name = device.display_name(), "connecting");
        self.inner
            .transport
            .invoke_method(&device.path, bluez::DEVICE_INTERFACE, "Connect")
            .await?;

        if let Err(e) = Preferences::remember_device(self.inner.settings.as_ref(), &device) {
            warn!(error = %e, "failed to persist last connected device");
        }
        Ok(Device {
            connected: true,
            ..device
        })
    }

    pub async fn disconnect(&self, address: &MacAddress) -> Result<(), CoreError> {
        let path = address.device_path(&self.inner.adapter);
        info!(%address, "disconnecting");
        self.inner
            .transport
            .invoke_method(&path, bluez::DEVICE_INTERFACE, "Disconnect")
            .await?;
        Ok(())
    }

    /// Run discovery for `window`, then list. Discovery is stopped even if
    /// the window is cut short by `cancel`.
    pub async fn discover(
        &self,
        window: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>, CoreError> {
        let adapter = &self.inner.adapter;
        self.inner
            .transport
            .invoke_method(adapter, bluez::ADAPTER_INTERFACE, "StartDiscovery")
            .await?;
        debug!(window_ms = window.as_millis(), "discovery started");

        tokio::select! {
            biased;
            () = cancel.cancelled() => debug!("discovery window cut short"),
            () = tokio::time::sleep(window) => {}
        }

        if let Err(e) = self
            .inner
            .transport
            .invoke_method(adapter, bluez::ADAPTER_INTERFACE, "StopDiscovery")
            .await
        {
            warn!(error = %e, "failed to stop discovery");
        }
        self.list().await
    }
}
