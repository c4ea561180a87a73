// ── Power coordinator ──
//
// The facade the host talks to. Translates suspend, resume, and launch
// events plus manual menu actions into adapter, WiFi, standby, and
// reconnect operations. Every background task runs under one root
// cancellation token owned here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use bluewake_api::RadioTransport;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapter::{AdapterController, AdapterParts, EnableHandle, EnableOutcome};
use crate::config::CoreConfig;
use crate::directory::DeviceDirectory;
use crate::error::CoreError;
use crate::model::{AdapterState, Device, MacAddress};
use crate::prefs::{Preferences, SettingsStore};
use crate::reconnect::{EngineParts, ReconnectEngine, ReconnectOutcome};
use crate::runner::StepRunner;
use crate::standby::{StandbyControl, StandbyGuard};
use crate::ui::{Notification, UiSink};
use crate::wifi::{WifiControl, WifiGuard};

/// Host capabilities handed to [`PowerCoordinator::new`].
pub struct Host<T, W> {
    pub transport: Arc<T>,
    pub wifi: Arc<W>,
    pub settings: Arc<dyn SettingsStore>,
    pub standby: Arc<dyn StandbyControl>,
    pub ui: Arc<dyn UiSink>,
    pub runner: StepRunner<T>,
}

/// Point-in-time view for `status` output.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub state: AdapterState,
    pub powered: bool,
    pub standby_suppressed: bool,
    pub strategy: String,
    pub reconnect_scheduled: bool,
    pub preferences: Preferences,
}

// ── PowerCoordinator ─────────────────────────────────────────────

/// Cheaply cloneable via `Arc<CoordinatorInner>`.
pub struct PowerCoordinator<T, W> {
    inner: Arc<CoordinatorInner<T, W>>,
}

struct CoordinatorInner<T, W> {
    config: CoreConfig,
    adapter: AdapterController<T, W>,
    directory: DeviceDirectory<T>,
    reconnect: ReconnectEngine<T>,
    settings: Arc<dyn SettingsStore>,
    ui: Arc<dyn UiSink>,
    cancel: CancellationToken,
    /// Cancelled on suspend so a stale resume never schedules a reconnect.
    resume_chain: std::sync::Mutex<CancellationToken>,
    was_on_before_suspend: AtomicBool,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T, W> Clone for PowerCoordinator<T, W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RadioTransport, W: WifiControl> PowerCoordinator<T, W> {
    pub fn new(config: CoreConfig, host: Host<T, W>) -> Self {
        let cancel = CancellationToken::new();
        let standby = Arc::new(StandbyGuard::new(host.standby));
        let wifi = WifiGuard::new(host.wifi, Arc::clone(&host.settings), config.wifi_policy);

        let adapter = AdapterController::new(
            AdapterParts {
                transport: Arc::clone(&host.transport),
                path: config.adapter_path.clone(),
                wifi,
                standby,
                ui: Arc::clone(&host.ui),
                policy: config.enable_policy,
            },
            cancel.child_token(),
        );
        let directory = DeviceDirectory::new(
            host.transport,
            config.adapter_path.clone(),
            Arc::clone(&host.settings),
        );
        let reconnect = ReconnectEngine::new(
            EngineParts {
                directory: directory.clone(),
                runner: host.runner,
                settings: Arc::clone(&host.settings),
                ui: Arc::clone(&host.ui),
                processes: config.processes.clone(),
                settle: config.verify_settle,
            },
            cancel.child_token(),
        );

        let resume_chain = cancel.child_token();
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                adapter,
                directory,
                reconnect,
                settings: host.settings,
                ui: host.ui,
                cancel,
                resume_chain: std::sync::Mutex::new(resume_chain),
                was_on_before_suspend: AtomicBool::new(false),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn adapter(&self) -> &AdapterController<T, W> {
        &self.inner.adapter
    }

    pub fn directory(&self) -> &DeviceDirectory<T> {
        &self.inner.directory
    }

    pub fn reconnect(&self) -> &ReconnectEngine<T> {
        &self.inner.reconnect
    }

    pub fn preferences(&self) -> Preferences {
        Preferences::load(self.inner.settings.as_ref())
    }

    pub fn state(&self) -> watch::Receiver<AdapterState> {
        self.inner.adapter.subscribe()
    }

    // ── Host events ──────────────────────────────────────────────

    /// Launch-time hook. If the radio is already on, standby is
    /// suppressed and, when enabled by preference, a reconnect is
    /// scheduled after the startup grace period.
    pub async fn on_startup(&self) {
        let state = self.inner.adapter.refresh_state().await;
        if state != AdapterState::On {
            debug!("radio off at startup");
            return;
        }
        self.inner.adapter.standby().acquire();

        if self.preferences().startup_reconnect {
            self.inner
                .reconnect
                .schedule_after(self.inner.config.startup_grace);
        }
    }

    /// Suspend hook. Must run to completion before the host sleeps.
    pub async fn on_suspend(&self) {
        let enable_was_pending = self.inner.adapter.abort_pending_enable().await;
        let was_on = self.inner.adapter.is_enabled().await;
        self.inner
            .was_on_before_suspend
            .store(was_on, Ordering::SeqCst);

        self.inner.reconnect.cancel_scheduled();
        self.invalidate_resume_chain();

        if was_on {
            self.inner.adapter.disable(false).await;
        } else if enable_was_pending {
            // The power-on request may still be in flight.
            self.inner.adapter.force_off().await;
        }
        self.inner.adapter.standby().release();
        info!(was_on, "suspend handled");
    }

    /// Resume hook. Re-enables the radio if it was on before suspend and
    /// `auto_resume_bt` is set, then schedules a reconnect once the radio
    /// is confirmed.
    pub async fn on_resume(&self) {
        let was_on = self
            .inner
            .was_on_before_suspend
            .swap(false, Ordering::SeqCst);
        if !was_on {
            debug!("radio was off before suspend; nothing to resume");
            return;
        }
        if !self.preferences().auto_resume_bt {
            debug!("auto_resume_bt disabled; leaving radio off");
            return;
        }

        info!("resuming radio");
        let handle = self.inner.adapter.enable_async(true);
        let chain = self.renew_resume_chain();
        let reconnect = self.inner.reconnect.clone();

        let task = tokio::spawn(async move {
            let outcome = handle.outcome().await;
            if chain.is_cancelled() {
                debug!(?outcome, "resume chain invalidated");
                return;
            }
            if outcome == EnableOutcome::Enabled {
                reconnect.schedule_reconnect();
            }
        });
        self.track(task).await;
    }

    /// Cancel every background task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("coordinator shut down");
    }

    // ── Manual actions ───────────────────────────────────────────

    pub fn enable(&self) -> EnableHandle {
        self.inner.adapter.enable_async(false)
    }

    pub async fn disable(&self) {
        self.inner.reconnect.cancel_scheduled();
        self.invalidate_resume_chain();
        self.inner.adapter.disable(true).await;
    }

    pub async fn connect(&self, address: &MacAddress) -> Result<Device, CoreError> {
        match self.inner.directory.connect(address).await {
            Ok(device) => {
                self.inner.ui.show_message(&Notification::Connected {
                    device: device.display_name().to_owned(),
                });
                Ok(device)
            }
            Err(e) => {
                self.inner.ui.show_message(&Notification::ConnectFailed {
                    device: address.to_string(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub async fn disconnect(&self, address: &MacAddress) -> Result<(), CoreError> {
        let device = self
            .inner
            .directory
            .last_listing()
            .iter()
            .find(|d| &d.address == address)
            .map_or_else(|| address.to_string(), |d| d.display_name().to_owned());

        match self.inner.directory.disconnect(address).await {
            Ok(()) => {
                self.inner
                    .ui
                    .show_message(&Notification::Disconnected { device });
                Ok(())
            }
            Err(e) => {
                self.inner.ui.show_message(&Notification::DisconnectFailed {
                    device,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub async fn reconnect_now(&self) -> Result<ReconnectOutcome, CoreError> {
        self.inner.reconnect.reconnect_now().await
    }

    pub async fn scan(&self, window: Duration) -> Result<Vec<Device>, CoreError> {
        self.inner
            .directory
            .discover(window, &self.inner.cancel)
            .await
    }

    pub async fn status(&self) -> Status {
        let state = self.inner.adapter.refresh_state().await;
        let powered = match state {
            AdapterState::On => true,
            AdapterState::Off => false,
            AdapterState::Enabling | AdapterState::Disabling => {
                self.inner.adapter.is_enabled().await
            }
        };
        Status {
            state,
            powered,
            standby_suppressed: self.inner.adapter.standby().is_held(),
            strategy: self.inner.reconnect.current_strategy().id.to_owned(),
            reconnect_scheduled: self.inner.reconnect.is_scheduled(),
            preferences: self.preferences(),
        }
    }

    // ── Internals ────────────────────────────────────────────────

    fn invalidate_resume_chain(&self) {
        self.inner
            .resume_chain
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    fn renew_resume_chain(&self) -> CancellationToken {
        let fresh = self.inner.cancel.child_token();
        let previous = std::mem::replace(
            &mut *self
                .inner
                .resume_chain
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            fresh.clone(),
        );
        previous.cancel();
        fresh
    }

    async fn track(&self, task: JoinHandle<()>) {
        let mut handles = self.inner.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(task);
    }
}
