// ── Adapter power control ──
//
// Drives the radio between Off and On. Enabling is asynchronous and
// single-flight: a new enable supersedes any pending one, and only the
// newest attempt ever reports an outcome. The power-on request itself is
// fire-and-forget; confirmation comes from polling the Powered property.
// An attempt that is cut short puts WiFi back the way it found it, unless a
// newer attempt has taken over the snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bluewake_api::{ObjectPath, RadioTransport, bluez};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::AdapterState;
use crate::poll::{PollOutcome, RetryPolicy, poll_until};
use crate::standby::StandbyGuard;
use crate::ui::{Notification, UiSink};
use crate::wifi::{WifiControl, WifiGuard};

/// Terminal result of one enable attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    /// The adapter reported powered within the confirmation budget.
    Enabled,
    /// The budget ran out. Standby was released and WiFi restored.
    TimedOut,
    /// Superseded, aborted, or shut down before confirmation. No
    /// notification was shown; WiFi was restored unless a newer attempt
    /// took over.
    Aborted,
}

/// Handle to an in-flight enable.
#[derive(Debug)]
pub struct EnableHandle {
    token: CancellationToken,
    task: JoinHandle<EnableOutcome>,
}

impl EnableHandle {
    /// Stop polling. The attempt resolves as [`EnableOutcome::Aborted`]
    /// unless it already finished.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn outcome(self) -> EnableOutcome {
        self.task.await.unwrap_or(EnableOutcome::Aborted)
    }
}

/// Collaborators an [`AdapterController`] drives.
pub struct AdapterParts<T, W> {
    pub transport: Arc<T>,
    pub path: ObjectPath,
    pub wifi: WifiGuard<W>,
    pub standby: Arc<StandbyGuard>,
    pub ui: Arc<dyn UiSink>,
    pub policy: RetryPolicy,
}

pub struct AdapterController<T, W> {
    inner: Arc<AdapterInner<T, W>>,
}

struct AdapterInner<T, W> {
    transport: Arc<T>,
    path: ObjectPath,
    wifi: WifiGuard<W>,
    standby: Arc<StandbyGuard>,
    ui: Arc<dyn UiSink>,
    policy: RetryPolicy,
    state: watch::Sender<AdapterState>,
    pending: Mutex<Option<PendingEnable>>,
    generation: AtomicU64,
    cancel: CancellationToken,
}

struct PendingEnable {
    generation: u64,
    token: CancellationToken,
    /// Cancelled once the attempt's task has finished, however it ended.
    settled: CancellationToken,
}

impl<T, W> Clone for AdapterController<T, W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RadioTransport, W: WifiControl> AdapterController<T, W> {
    /// `cancel` is the owner's shutdown token; every enable runs under a
    /// child of it.
    pub fn new(parts: AdapterParts<T, W>, cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(AdapterState::Off);
        Self {
            inner: Arc::new(AdapterInner {
                transport: parts.transport,
                path: parts.path,
                wifi: parts.wifi,
                standby: parts.standby,
                ui: parts.ui,
                policy: parts.policy,
                state,
                pending: Mutex::new(None),
                generation: AtomicU64::new(0),
                cancel,
            }),
        }
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn state(&self) -> AdapterState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AdapterState> {
        self.inner.state.subscribe()
    }

    pub fn standby(&self) -> &Arc<StandbyGuard> {
        &self.inner.standby
    }

    /// Query the radio. A failed query reads as off.
    pub async fn is_enabled(&self) -> bool {
        self.inner.is_powered().await
    }

    /// Re-read the radio and publish On/Off, unless an enable is in flight.
    pub async fn refresh_state(&self) -> AdapterState {
        if self.has_pending_enable() {
            return self.state();
        }
        let state = if self.is_enabled().await {
            AdapterState::On
        } else {
            AdapterState::Off
        };
        self.inner.state.send_replace(state);
        state
    }

    pub fn has_pending_enable(&self) -> bool {
        self.inner.lock_pending().is_some()
    }

    // ── Enable ───────────────────────────────────────────────────────

    /// Start enabling the radio. `resume` selects post-resume WiFi policy
    /// and suppresses the success notification.
    pub fn enable_async(&self, resume: bool) -> EnableHandle {
        let token = self.inner.cancel.child_token();
        let settled = CancellationToken::new();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = self.inner.lock_pending().replace(PendingEnable {
            generation,
            token: token.clone(),
            settled: settled.clone(),
        });
        if let Some(previous) = previous {
            debug!(
                superseded = previous.generation,
                generation, "superseding pending enable"
            );
            previous.token.cancel();
        }

        let inner = Arc::clone(&self.inner);
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let _settled = settled.drop_guard();
            let outcome = inner.run_enable(generation, &task_token, resume).await;
            debug!(generation, ?outcome, "enable finished");
            outcome
        });

        EnableHandle { token, task }
    }

    /// Cancel the pending enable, if any, and wait until its task has
    /// cleaned up. Returns whether one was pending.
    pub async fn abort_pending_enable(&self) -> bool {
        let Some(pending) = self.inner.lock_pending().take() else {
            return false;
        };
        debug!(generation = pending.generation, "aborting pending enable");
        pending.token.cancel();
        self.inner.state.send_if_modified(|state| {
            let was_enabling = *state == AdapterState::Enabling;
            if was_enabling {
                *state = AdapterState::Off;
            }
            was_enabling
        });
        pending.settled.cancelled().await;
        true
    }

    // ── Disable ──────────────────────────────────────────────────────

    /// Power the radio off and release standby suppression. A cut-short
    /// enable may still have its power-on request in flight, so the radio
    /// is powered off whatever it reports.
    pub async fn disable(&self, notify: bool) {
        let aborted = self.abort_pending_enable().await;
        if !aborted && !self.is_enabled().await {
            debug!("adapter already off");
            self.inner.standby.release();
            self.inner.state.send_replace(AdapterState::Off);
            return;
        }
        self.power_off().await;
        if notify {
            self.inner.ui.show_message(&Notification::Disabled);
        }
    }

    /// Power off without checking the current state first. Used when an
    /// enable was cut short and its power-on request may still land.
    pub async fn force_off(&self) {
        self.abort_pending_enable().await;
        self.power_off().await;
    }

    async fn power_off(&self) {
        self.inner.state.send_replace(AdapterState::Disabling);
        info!("powering adapter off");
        if let Err(e) = self
            .inner
            .transport
            .set_bool_property(&self.inner.path, bluez::ADAPTER_INTERFACE, "Powered", false)
            .await
        {
            warn!(error = %e, "power-off request failed");
        }
        self.inner.standby.release();
        self.inner.state.send_replace(AdapterState::Off);
    }
}

impl<T: RadioTransport, W: WifiControl> AdapterInner<T, W> {
    async fn run_enable(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        resume: bool,
    ) -> EnableOutcome {
        if cancel.is_cancelled() {
            return self.aborted(generation).await;
        }
        self.state.send_replace(AdapterState::Enabling);
        // Subscribers see Enabling even when the radio is already up.
        tokio::task::yield_now().await;

        if self.is_powered().await {
            if cancel.is_cancelled() {
                return self.aborted(generation).await;
            }
            debug!("adapter already powered");
            self.standby.acquire();
            // A superseded attempt may have forced WiFi on.
            self.wifi.restore(resume).await;
            self.finish(generation, AdapterState::On);
            return EnableOutcome::Enabled;
        }
        if cancel.is_cancelled() {
            return self.aborted(generation).await;
        }

        self.wifi.snapshot().await;
        self.standby.acquire();
        if self.wifi.ensure_on(cancel).await == PollOutcome::Cancelled {
            return self.aborted(generation).await;
        }

        info!(resume, "powering adapter on");
        self.request_power_on();

        match poll_until(self.policy, cancel, || self.is_powered()).await {
            PollOutcome::Satisfied { attempts } => {
                info!(attempts, "adapter powered");
                self.wifi.restore(resume).await;
                self.finish(generation, AdapterState::On);
                if !resume {
                    self.ui.show_message(&Notification::Enabled);
                }
                EnableOutcome::Enabled
            }
            PollOutcome::Exhausted => {
                let timeout = self.policy.budget();
                warn!(timeout_ms = timeout.as_millis(), "adapter did not power on");
                self.standby.release();
                self.wifi.restore(resume).await;
                self.finish(generation, AdapterState::Off);
                self.ui
                    .show_message(&Notification::EnableTimedOut { timeout });
                EnableOutcome::TimedOut
            }
            PollOutcome::Cancelled => self.aborted(generation).await,
        }
    }

    fn request_power_on(&self) {
        let transport = Arc::clone(&self.transport);
        let path = self.path.clone();
        tokio::spawn(async move {
            if let Err(e) = transport
                .set_bool_property(&path, bluez::ADAPTER_INTERFACE, "Powered", true)
                .await
            {
                warn!(error = %e, "power-on request failed");
            }
        });
    }

    async fn is_powered(&self) -> bool {
        match self
            .transport
            .get_bool_property(&self.path, bluez::ADAPTER_INTERFACE, "Powered")
            .await
        {
            Ok(powered) => powered,
            Err(e) => {
                debug!(error = %e, "powered query failed");
                false
            }
        }
    }

    async fn aborted(&self, generation: u64) -> EnableOutcome {
        debug!(generation, "enable aborted");
        if self.clear_pending(generation) {
            self.state.send_replace(AdapterState::Off);
        }
        // A newer attempt inherits the snapshot and restores WiFi itself.
        if self.generation.load(Ordering::SeqCst) == generation {
            self.wifi.rollback().await;
        }
        EnableOutcome::Aborted
    }

    /// Publish `state` if this attempt is still the current one.
    fn finish(&self, generation: u64, state: AdapterState) {
        if self.clear_pending(generation) {
            self.state.send_replace(state);
        }
    }

    fn clear_pending(&self, generation: u64) -> bool {
        let mut pending = self.lock_pending();
        if pending.as_ref().is_some_and(|p| p.generation == generation) {
            *pending = None;
            true
        } else {
            false
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<PendingEnable>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
