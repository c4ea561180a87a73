#![allow(clippy::unwrap_used)]
// Enable/disable behavior of the adapter controller, driven through the
// coordinator's manual actions.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bluewake_core::{AdapterState, EnableOutcome, MemorySettings, Notification};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

use common::{FakeRadio, PowerBehavior, harness};

#[tokio::test(start_paused = true)]
async fn test_enable_confirms_and_suppresses_standby() {
    let h = harness(FakeRadio::new(false), true, MemorySettings::new());
    let mut state = h.coordinator.state();

    let outcome = h.coordinator.enable().outcome().await;

    assert_eq!(outcome, EnableOutcome::Enabled);
    assert_eq!(*state.borrow_and_update(), AdapterState::On);
    assert!(h.standby.held());
    assert_eq!(h.radio.count("set Powered=true"), 1);
    assert_eq!(h.ui.messages(), vec![Notification::Enabled]);
}

#[tokio::test(start_paused = true)]
async fn test_enable_when_already_powered_skips_power_request() {
    let h = harness(FakeRadio::new(true), true, MemorySettings::new());
    let start = Instant::now();

    let outcome = h.coordinator.enable().outcome().await;

    assert_eq!(outcome, EnableOutcome::Enabled);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(h.radio.log().is_empty());
    assert!(h.standby.held());
    assert_eq!(h.coordinator.adapter().state(), AdapterState::On);
}

#[tokio::test(start_paused = true)]
async fn test_enable_when_already_powered_publishes_enabling_first() {
    let h = harness(FakeRadio::new(true), true, MemorySettings::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut state = h.coordinator.state();
    let recorder = tokio::spawn({
        let seen = Arc::clone(&seen);
        async move {
            while state.changed().await.is_ok() {
                let current = *state.borrow_and_update();
                seen.lock().unwrap().push(current);
            }
        }
    });
    tokio::task::yield_now().await;

    let outcome = h.coordinator.enable().outcome().await;
    common::run_for(1).await;
    recorder.abort();

    assert_eq!(outcome, EnableOutcome::Enabled);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![AdapterState::Enabling, AdapterState::On]
    );
}

#[tokio::test(start_paused = true)]
async fn test_enable_timeout_releases_standby() {
    let radio = FakeRadio::new(false);
    radio.set_behavior(PowerBehavior::Never);
    let h = harness(radio, true, MemorySettings::new());
    let start = Instant::now();

    let outcome = h.coordinator.enable().outcome().await;

    assert_eq!(outcome, EnableOutcome::TimedOut);
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert!(!h.standby.held());
    assert_eq!(h.coordinator.adapter().state(), AdapterState::Off);
    assert_eq!(
        h.ui.messages(),
        vec![Notification::EnableTimedOut {
            timeout: Duration::from_secs(3)
        }]
    );
    // WiFi was on before; a manual enable leaves it alone.
    assert!(h.wifi.on());
    assert!(h.wifi.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_enable_brings_wifi_up_and_restores_it() {
    let h = harness(FakeRadio::new(false), false, MemorySettings::new());

    let outcome = h.coordinator.enable().outcome().await;

    assert_eq!(outcome, EnableOutcome::Enabled);
    assert_eq!(h.wifi.log(), vec!["on", "off"]);
    assert!(!h.wifi.on());
}

#[tokio::test(start_paused = true)]
async fn test_second_enable_supersedes_first() {
    let radio = FakeRadio::new(false);
    radio.set_behavior(PowerBehavior::After(Duration::from_millis(250)));
    let h = harness(radio, true, MemorySettings::new());

    let first = h.coordinator.enable();
    let second = h.coordinator.enable();

    assert_eq!(first.outcome().await, EnableOutcome::Aborted);
    assert_eq!(second.outcome().await, EnableOutcome::Enabled);
    assert_eq!(h.ui.count(|n| *n == Notification::Enabled), 1);
    assert_eq!(h.radio.count("set Powered=true"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abort_is_silent() {
    let radio = FakeRadio::new(false);
    radio.set_behavior(PowerBehavior::After(Duration::from_secs(1)));
    let h = harness(radio, true, MemorySettings::new());

    let handle = h.coordinator.enable();
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.abort();

    assert_eq!(handle.outcome().await, EnableOutcome::Aborted);
    common::run_for(5).await;
    assert!(h.ui.messages().is_empty());
    assert_eq!(h.coordinator.adapter().state(), AdapterState::Off);
}

#[tokio::test(start_paused = true)]
async fn test_abort_restores_wifi() {
    let radio = FakeRadio::new(false);
    radio.set_behavior(PowerBehavior::After(Duration::from_secs(1)));
    let h = harness(radio, false, MemorySettings::new());

    let handle = h.coordinator.enable();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(h.wifi.on());
    handle.abort();

    assert_eq!(handle.outcome().await, EnableOutcome::Aborted);
    common::run_for(5).await;
    assert!(!h.wifi.on());
    assert_eq!(h.wifi.log(), vec!["on", "off"]);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_enable_still_restores_wifi() {
    let radio = FakeRadio::new(false);
    radio.set_behavior(PowerBehavior::After(Duration::from_secs(1)));
    let h = harness(radio, false, MemorySettings::new());

    let first = h.coordinator.enable();
    tokio::time::sleep(Duration::from_millis(600)).await;
    let second = h.coordinator.enable();

    assert_eq!(first.outcome().await, EnableOutcome::Aborted);
    assert_eq!(second.outcome().await, EnableOutcome::Enabled);
    common::run_for(5).await;
    assert!(h.radio.is_powered());
    assert!(!h.wifi.on());
    assert_eq!(h.wifi.log(), vec!["on", "off"]);
}

#[tokio::test(start_paused = true)]
async fn test_disable_during_enable_powers_off() {
    let radio = FakeRadio::new(false);
    radio.set_behavior(PowerBehavior::After(Duration::from_secs(1)));
    let h = harness(radio, false, MemorySettings::new());

    let handle = h.coordinator.enable();
    tokio::time::sleep(Duration::from_millis(600)).await;
    h.coordinator.disable().await;

    assert_eq!(handle.outcome().await, EnableOutcome::Aborted);
    common::run_for(5).await;
    assert!(!h.radio.is_powered());
    assert_eq!(h.radio.count("set Powered=false"), 1);
    assert!(!h.standby.held());
    assert!(!h.wifi.on());
    assert_eq!(h.coordinator.adapter().state(), AdapterState::Off);
    assert!(!h.coordinator.adapter().has_pending_enable());
    assert_eq!(h.ui.count(|n| *n == Notification::Enabled), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disable_powers_off_and_notifies() {
    let h = harness(FakeRadio::new(false), true, MemorySettings::new());
    h.coordinator.enable().outcome().await;

    h.coordinator.disable().await;

    assert!(!h.radio.is_powered());
    assert!(!h.standby.held());
    assert_eq!(h.coordinator.adapter().state(), AdapterState::Off);
    assert_eq!(
        h.ui.messages(),
        vec![Notification::Enabled, Notification::Disabled]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disable_when_off_sends_nothing() {
    let h = harness(FakeRadio::new(false), true, MemorySettings::new());

    h.coordinator.disable().await;

    assert!(h.radio.log().is_empty());
    assert_eq!(h.standby.allowed.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(h.ui.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_radio_times_out() {
    let radio = FakeRadio::new(false);
    radio.set_unreachable(true);
    let h = harness(radio, true, MemorySettings::new());

    let outcome = h.coordinator.enable().outcome().await;

    assert_eq!(outcome, EnableOutcome::TimedOut);
    let status = h.coordinator.status().await;
    assert!(!status.powered);
    assert!(!status.standby_suppressed);
}
