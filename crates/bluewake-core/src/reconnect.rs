// ── Reconnect engine ──
//
// Owns the single reconnect slot. Scheduling a reconnect cancels whatever
// was scheduled before; suspend and shutdown cancel the slot outright. A
// run resolves the selected strategy, executes it through the runner,
// waits for the radio to settle, and checks the remembered device once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bluewake_api::RadioTransport;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProcessTable;
use crate::directory::DeviceDirectory;
use crate::error::CoreError;
use crate::model::MacAddress;
use crate::poll::{PollOutcome, RetryPolicy, poll_until};
use crate::prefs::{Preferences, SettingsStore, keys};
use crate::runner::StepRunner;
use crate::strategy::{Catalogue, ReconnectStrategy};
use crate::ui::{Notification, UiSink};

/// How a reconnect run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectOutcome {
    Connected,
    NotConnected,
    Cancelled,
}

/// Collaborators a [`ReconnectEngine`] drives.
pub struct EngineParts<T> {
    pub directory: DeviceDirectory<T>,
    pub runner: StepRunner<T>,
    pub settings: Arc<dyn SettingsStore>,
    pub ui: Arc<dyn UiSink>,
    pub processes: ProcessTable,
    pub settle: Duration,
}

pub struct ReconnectEngine<T> {
    inner: Arc<EngineInner<T>>,
}

struct EngineInner<T> {
    directory: DeviceDirectory<T>,
    runner: StepRunner<T>,
    settings: Arc<dyn SettingsStore>,
    ui: Arc<dyn UiSink>,
    processes: ProcessTable,
    settle: Duration,
    catalogue: Catalogue,
    cancel: CancellationToken,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    token: Option<CancellationToken>,
}

/// A reconnect run that has been resolved and is ready to start.
struct Job {
    strategy: ReconnectStrategy,
    address: MacAddress,
    device: String,
}

impl<T> Clone for ReconnectEngine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: RadioTransport> ReconnectEngine<T> {
    pub fn new(parts: EngineParts<T>, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                directory: parts.directory,
                runner: parts.runner,
                settings: parts.settings,
                ui: parts.ui,
                processes: parts.processes,
                settle: parts.settle,
                catalogue: Catalogue::builtin(),
                cancel,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.inner.catalogue
    }

    pub fn runner(&self) -> &StepRunner<T> {
        &self.inner.runner
    }

    /// Strategy named by the stored preference, or the default.
    pub fn current_strategy(&self) -> &ReconnectStrategy {
        let prefs = Preferences::load(self.inner.settings.as_ref());
        self.inner
            .catalogue
            .select(prefs.reconnect_strategy_id.as_deref())
    }

    /// Validate and persist a strategy choice.
    pub fn set_strategy(&self, id: &str) -> Result<&ReconnectStrategy, CoreError> {
        let strategy = self.inner.catalogue.get(id)?;
        Preferences::set_strategy(self.inner.settings.as_ref(), strategy.id)?;
        info!(strategy = strategy.id, "reconnect strategy selected");
        Ok(strategy)
    }

    pub fn is_scheduled(&self) -> bool {
        self.lock_slot().token.is_some()
    }

    // ── Scheduling ───────────────────────────────────────────────────

    /// Schedule a reconnect after the current strategy's delay. Returns
    /// whether anything was scheduled: the manual strategy and a missing
    /// remembered device both skip silently.
    pub fn schedule_reconnect(&self) -> bool {
        self.schedule(None)
    }

    /// Like [`schedule_reconnect`](Self::schedule_reconnect) but with a
    /// fixed delay instead of the strategy's own.
    pub fn schedule_after(&self, delay: Duration) -> bool {
        self.schedule(Some(delay))
    }

    fn schedule(&self, delay_override: Option<Duration>) -> bool {
        let job = match self.resolve_job() {
            Ok(job) => job,
            Err(e) => {
                debug!(reason = %e, "reconnect not scheduled");
                return false;
            }
        };
        let Some(delay) = job.strategy.delay.as_duration() else {
            debug!("manual strategy; reconnect not scheduled");
            return false;
        };
        let delay = delay_override.unwrap_or(delay);
        info!(
            strategy = job.strategy.id,
            address = %job.address,
            delay_ms = delay.as_millis(),
            "reconnect scheduled"
        );
        drop(self.start(job, delay));
        true
    }

    /// Cancel the scheduled or running reconnect, if any.
    pub fn cancel_scheduled(&self) {
        let token = self.lock_slot().token.take();
        if let Some(token) = token {
            debug!("cancelling scheduled reconnect");
            token.cancel();
        }
    }

    /// Run the current strategy now, replacing anything scheduled. Works
    /// for the manual strategy too.
    pub async fn reconnect_now(&self) -> Result<ReconnectOutcome, CoreError> {
        let job = self.resolve_job()?;
        info!(strategy = job.strategy.id, address = %job.address, "reconnecting now");
        Ok(self
            .start(job, Duration::ZERO)
            .await
            .unwrap_or(ReconnectOutcome::Cancelled))
    }

    fn resolve_job(&self) -> Result<Job, CoreError> {
        let prefs = Preferences::load(self.inner.settings.as_ref());
        let address = prefs
            .last_connected_address
            .ok_or_else(|| CoreError::InvalidPreconditions {
                reason: "no remembered device".into(),
            })?;
        let strategy = self
            .inner
            .catalogue
            .select(prefs.reconnect_strategy_id.as_deref())
            .clone();
        let device = prefs
            .last_connected_name
            .unwrap_or_else(|| address.to_string());
        Ok(Job {
            strategy,
            address,
            device,
        })
    }

    /// Claim the slot and spawn the run.
    fn start(&self, job: Job, delay: Duration) -> JoinHandle<ReconnectOutcome> {
        let token = self.inner.cancel.child_token();
        let generation = {
            let mut slot = self.lock_slot();
            if let Some(previous) = slot.token.replace(token.clone()) {
                debug!("replacing previously scheduled reconnect");
                previous.cancel();
            }
            slot.generation += 1;
            slot.generation
        };

        let engine = self.clone();
        tokio::spawn(async move {
            let outcome = engine.run_job(&job, delay, &token).await;
            engine.release_slot(generation);
            outcome
        })
    }

    async fn run_job(&self, job: &Job, delay: Duration, token: &CancellationToken) -> ReconnectOutcome {
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {}
            }
        }
        if token.is_cancelled() {
            debug!("reconnect cancelled before start");
            return ReconnectOutcome::Cancelled;
        }

        let inner = &self.inner;
        let steps = job.strategy.plan(
            &job.address,
            inner.directory.adapter_path(),
            &inner.processes,
        );
        info!(strategy = job.strategy.id, steps = steps.len(), "running reconnect strategy");

        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("reconnect cancelled while strategy ran");
                return ReconnectOutcome::Cancelled;
            }
            result = inner.runner.run(&steps) => {
                if let Err(e) = result {
                    warn!(error = %e, "strategy runner failed to start");
                }
            }
        }

        let verify = RetryPolicy::once_after(inner.settle);
        match poll_until(verify, token, || inner.directory.is_connected(&job.address)).await {
            PollOutcome::Satisfied { .. } => {
                info!(address = %job.address, strategy = job.strategy.id, "reconnected");
                self.refresh_remembered_name(&job.address).await;
                inner.ui.show_message(&Notification::ReconnectSucceeded {
                    device: job.device.clone(),
                    strategy: job.strategy.label.to_owned(),
                });
                ReconnectOutcome::Connected
            }
            PollOutcome::Exhausted => {
                let err = CoreError::VerificationFailed {
                    address: job.address.to_string(),
                    strategy: job.strategy.id.to_owned(),
                };
                warn!(error = %err, "reconnect failed");
                inner.ui.show_message(&Notification::ReconnectFailed {
                    device: job.device.clone(),
                    strategy: job.strategy.label.to_owned(),
                });
                ReconnectOutcome::NotConnected
            }
            PollOutcome::Cancelled => {
                debug!("reconnect cancelled before verification");
                ReconnectOutcome::Cancelled
            }
        }
    }

    /// The device may have been renamed since it was remembered.
    async fn refresh_remembered_name(&self, address: &MacAddress) {
        let name = match self.inner.directory.find(address).await {
            Ok(device) => device.name,
            Err(e) => {
                debug!(error = %e, "device lookup after reconnect failed");
                return;
            }
        };
        let Some(name) = name else {
            return;
        };
        let store = self.inner.settings.as_ref();
        if Preferences::load(store).last_connected_name.as_deref() == Some(name.as_str()) {
            return;
        }
        store.write(keys::LAST_CONNECTED_NAME, name.into());
        if let Err(e) = store.flush() {
            warn!(error = %e, "failed to store refreshed device name");
        }
    }

    fn release_slot(&self, generation: u64) {
        let mut slot = self.lock_slot();
        if slot.generation == generation {
            slot.token = None;
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
