// ── User notification surface ──
//
// The coordinator reports outcomes through a `UiSink`. Core never renders
// anything itself: the CLI prints, the daemon logs.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
}

/// Something the user should be told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Enabled,
    Disabled,
    EnableTimedOut { timeout: Duration },
    Connected { device: String },
    ConnectFailed { device: String, reason: String },
    Disconnected { device: String },
    DisconnectFailed { device: String, reason: String },
    ReconnectSucceeded { device: String, strategy: String },
    ReconnectFailed { device: String, strategy: String },
}

impl Notification {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Enabled | Self::Connected { .. } | Self::ReconnectSucceeded { .. } => {
                Severity::Success
            }
            Self::Disabled | Self::Disconnected { .. } => Severity::Info,
            Self::EnableTimedOut { .. }
            | Self::ConnectFailed { .. }
            | Self::DisconnectFailed { .. }
            | Self::ReconnectFailed { .. } => Severity::Warning,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("Bluetooth enabled"),
            Self::Disabled => f.write_str("Bluetooth disabled"),
            Self::EnableTimedOut { timeout } => write!(
                f,
                "Bluetooth did not come up within {:.1}s",
                timeout.as_secs_f64()
            ),
            Self::Connected { device } => write!(f, "Connected to {device}"),
            Self::ConnectFailed { device, reason } => {
                write!(f, "Could not connect to {device}: {reason}")
            }
            Self::Disconnected { device } => write!(f, "Disconnected from {device}"),
            Self::DisconnectFailed { device, reason } => {
                write!(f, "Could not disconnect from {device}: {reason}")
            }
            Self::ReconnectSucceeded { device, strategy } => {
                write!(f, "Reconnected to {device} ({strategy})")
            }
            Self::ReconnectFailed { device, strategy } => {
                write!(f, "Reconnect to {device} failed ({strategy})")
            }
        }
    }
}

/// Presentation capabilities supplied by the host.
pub trait UiSink: Send + Sync {
    fn show_message(&self, notification: &Notification);

    /// Yes/no question. Non-interactive sinks answer no.
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }

    /// Pick one of `items`. Non-interactive sinks pick nothing.
    fn select(&self, _title: &str, _items: &[String]) -> Option<usize> {
        None
    }
}

/// Sink that writes notifications to the log. Used by the daemon.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl UiSink for TracingSink {
    fn show_message(&self, notification: &Notification) {
        match notification.severity() {
            Severity::Warning => warn!(target: "bluewake::ui", "{notification}"),
            Severity::Info | Severity::Success => info!(target: "bluewake::ui", "{notification}"),
        }
    }
}
