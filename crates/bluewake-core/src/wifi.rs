// ── WiFi coexistence ──
//
// The radio shares firmware with WiFi: Bluetooth cannot be powered while
// WiFi is off. Enabling the radio snapshots WiFi state, forces WiFi on, and
// afterwards puts WiFi back the way the user had it (manual enable) or the
// way the `auto_restore_wifi` preference says (resume). The snapshot lives
// until something restores it, so an attempt that replaces a cut-short one
// keeps the state from before WiFi was forced on.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::poll::{PollOutcome, RetryPolicy, poll_until};
use crate::prefs::{Preferences, SettingsStore};

/// Host capability that reports and switches WiFi.
pub trait WifiControl: Send + Sync + 'static {
    fn is_on(&self) -> impl Future<Output = bool> + Send;
    fn turn_on(&self) -> impl Future<Output = Result<(), CoreError>> + Send;
    fn turn_off(&self) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Snapshot-and-restore wrapper around a [`WifiControl`].
pub struct WifiGuard<W> {
    wifi: Arc<W>,
    settings: Arc<dyn SettingsStore>,
    bring_up: RetryPolicy,
    snapshot: Mutex<Option<bool>>,
}

impl<W: WifiControl> WifiGuard<W> {
    pub fn new(wifi: Arc<W>, settings: Arc<dyn SettingsStore>, bring_up: RetryPolicy) -> Self {
        Self {
            wifi,
            settings,
            bring_up,
            snapshot: Mutex::new(None),
        }
    }

    pub fn control(&self) -> &Arc<W> {
        &self.wifi
    }

    /// Record whether WiFi is on right now, unless an earlier snapshot is
    /// still waiting to be restored.
    pub async fn snapshot(&self) {
        if let Some(kept) = *self.lock() {
            debug!(wifi_on = kept, "keeping earlier wifi snapshot");
            return;
        }
        let on = self.wifi.is_on().await;
        debug!(wifi_on = on, "wifi snapshot");
        let mut snapshot = self.lock();
        if snapshot.is_none() {
            *snapshot = Some(on);
        }
    }

    /// Turn WiFi on if needed and wait for the interface to report up.
    pub async fn ensure_on(&self, cancel: &CancellationToken) -> PollOutcome {
        if self.wifi.is_on().await {
            return PollOutcome::Satisfied { attempts: 0 };
        }
        info!("turning wifi on for bluetooth");
        if let Err(e) = self.wifi.turn_on().await {
            warn!(error = %e, "wifi turn-on request failed");
        }
        let outcome = poll_until(self.bring_up, cancel, || self.wifi.is_on()).await;
        if outcome == PollOutcome::Exhausted {
            warn!(
                budget_ms = self.bring_up.budget().as_millis(),
                "wifi did not come up; continuing anyway"
            );
        }
        outcome
    }

    /// Put WiFi back after an enable attempt. Never turns WiFi on, and
    /// does nothing without a snapshot.
    ///
    /// Resume: turn WiFi off unless `auto_restore_wifi` is set. Manual:
    /// turn it off only if the snapshot says it was off before.
    pub async fn restore(&self, resume: bool) {
        let Some(was_on) = self.lock().take() else {
            return;
        };
        let should_be_off = if resume {
            !Preferences::load(self.settings.as_ref()).auto_restore_wifi
        } else {
            !was_on
        };

        if !should_be_off || !self.wifi.is_on().await {
            return;
        }
        info!(resume, "restoring wifi to off");
        if let Err(e) = self.wifi.turn_off().await {
            warn!(error = %e, "wifi turn-off request failed");
        }
    }

    /// Undo a cut-short attempt: back to exactly what the snapshot saw.
    pub async fn rollback(&self) {
        self.restore(false).await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<bool>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::prefs::{MemorySettings, keys};

    #[derive(Default)]
    struct Switch {
        on: AtomicBool,
        ons: AtomicUsize,
        offs: AtomicUsize,
    }

    impl WifiControl for Switch {
        async fn is_on(&self) -> bool {
            self.on.load(Ordering::SeqCst)
        }

        async fn turn_on(&self) -> Result<(), CoreError> {
            self.ons.fetch_add(1, Ordering::SeqCst);
            self.on.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn turn_off(&self) -> Result<(), CoreError> {
            self.offs.fetch_add(1, Ordering::SeqCst);
            self.on.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn make_guard(initially_on: bool, settings: MemorySettings) -> (Arc<Switch>, WifiGuard<Switch>) {
        let wifi = Arc::new(Switch::default());
        wifi.on.store(initially_on, Ordering::SeqCst);
        let policy = RetryPolicy::new(Duration::from_millis(500), 20);
        let guard = WifiGuard::new(wifi.clone(), Arc::new(settings), policy);
        (wifi, guard)
    }

    #[tokio::test(start_paused = true)]
    async fn manual_enable_restores_off_state() {
        let (wifi, guard) = make_guard(false, MemorySettings::new());
        guard.snapshot().await;
        let outcome = guard.ensure_on(&CancellationToken::new()).await;
        assert_eq!(outcome, PollOutcome::Satisfied { attempts: 1 });
        guard.restore(false).await;
        assert!(!wifi.is_on().await);
        assert_eq!(wifi.offs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_enable_leaves_wifi_that_was_on() {
        let (wifi, guard) = make_guard(true, MemorySettings::new());
        guard.snapshot().await;
        guard.ensure_on(&CancellationToken::new()).await;
        guard.restore(false).await;
        assert!(wifi.is_on().await);
        assert_eq!(wifi.offs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_honors_auto_restore_preference() {
        let (wifi, guard) = make_guard(true, MemorySettings::new());
        guard.snapshot().await;
        guard.restore(true).await;
        assert!(!wifi.is_on().await);

        let settings = MemorySettings::with([(keys::AUTO_RESTORE_WIFI, true.into())]);
        let (wifi, guard) = make_guard(true, settings);
        guard.snapshot().await;
        guard.restore(true).await;
        assert!(wifi.is_on().await);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_policy_over_every_combination() {
        for resume in [true, false] {
            for prior_on in [true, false] {
                for auto_restore in [true, false] {
                    let settings =
                        MemorySettings::with([(keys::AUTO_RESTORE_WIFI, auto_restore.into())]);
                    let (wifi, guard) = make_guard(prior_on, settings);
                    guard.snapshot().await;
                    guard.ensure_on(&CancellationToken::new()).await;
                    let ons = wifi.ons.load(Ordering::SeqCst);

                    guard.restore(resume).await;

                    let case = format!("resume={resume} prior_on={prior_on} auto_restore={auto_restore}");
                    let expect_off = if resume { !auto_restore } else { !prior_on };
                    assert_eq!(wifi.ons.load(Ordering::SeqCst), ons, "turned on by restore: {case}");
                    assert_eq!(
                        wifi.offs.load(Ordering::SeqCst),
                        usize::from(expect_off),
                        "turn-off count: {case}"
                    );
                    assert_eq!(wifi.is_on().await, !expect_off, "final state: {case}");
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_snapshot_keeps_the_first() {
        let (wifi, guard) = make_guard(false, MemorySettings::new());
        guard.snapshot().await;
        guard.ensure_on(&CancellationToken::new()).await;
        guard.snapshot().await;
        guard.restore(false).await;
        assert!(!wifi.is_on().await);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_without_snapshot_is_a_no_op() {
        let (wifi, guard) = make_guard(true, MemorySettings::new());
        guard.restore(true).await;
        assert!(wifi.is_on().await);
        assert_eq!(wifi.offs.load(Ordering::SeqCst), 0);
    }
}
