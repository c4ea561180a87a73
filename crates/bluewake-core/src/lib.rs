//! Power and reconnect coordination for a Bluetooth radio that shares
//! firmware with WiFi.
//!
//! - **[`PowerCoordinator`]** — Facade for the host: suspend, resume, and
//!   launch hooks plus manual actions (enable, disable, connect, reconnect).
//!   Cheaply cloneable; owns the root cancellation token for every
//!   background task.
//!
//! - **[`AdapterController`]** — Single-flight asynchronous enable with
//!   bounded confirmation polling, WiFi coexistence, and standby
//!   suppression. Power state is observable through a `watch` channel.
//!
//! - **[`ReconnectEngine`]** — One reconnect slot, a catalogue of
//!   [`ReconnectStrategy`] recipes, and post-run verification. Recipes
//!   run out of process through [`ShellRunner`] or in process through
//!   [`InlineRunner`].
//!
//! - **Host capabilities** — [`SettingsStore`], [`WifiControl`],
//!   [`StandbyControl`], and [`UiSink`] are traits the binary implements.

pub mod adapter;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod model;
pub mod poll;
pub mod prefs;
pub mod reconnect;
pub mod runner;
pub mod standby;
pub mod strategy;
pub mod ui;
pub mod wifi;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::{AdapterController, EnableHandle, EnableOutcome};
pub use config::{CoreConfig, ProcessSpec, ProcessTable};
pub use coordinator::{Host, PowerCoordinator, Status};
pub use directory::DeviceDirectory;
pub use error::CoreError;
pub use model::{AdapterState, Device, MacAddress};
pub use poll::{PollOutcome, RetryPolicy};
pub use prefs::{MemorySettings, Preferences, SettingValue, SettingsStore, keys};
pub use reconnect::{ReconnectEngine, ReconnectOutcome};
pub use runner::{DbusSendCommand, InlineRunner, ShellRunner, StepRunner};
pub use standby::{StandbyControl, StandbyGuard};
pub use strategy::{Catalogue, DEFAULT_STRATEGY, ReconnectDelay, ReconnectStrategy, Step};
pub use ui::{Notification, Severity, TracingSink, UiSink};
pub use wifi::{WifiControl, WifiGuard};
