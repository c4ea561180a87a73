// ── Core error types ──
//
// User-facing errors from bluewake-core. Consumers never see D-Bus error
// names or zbus types directly: the `From<bluewake_api::Error>` impl folds
// transport failures into the taxonomy below.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Radio ────────────────────────────────────────────────────────
    #[error("Radio daemon unreachable: {reason}")]
    TransportUnreachable { reason: String },

    #[error("Radio call rejected: {message}")]
    Rejected { message: String },

    #[error("{operation} timed out after {}ms", timeout.as_millis())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    // ── Reconnect ────────────────────────────────────────────────────
    #[error("Device {address} not connected after strategy '{strategy}'")]
    VerificationFailed { address: String, strategy: String },

    #[error("Nothing to do: {reason}")]
    InvalidPreconditions { reason: String },

    #[error("Unknown reconnect strategy: {id}")]
    UnknownStrategy { id: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Invalid Bluetooth address: {raw}")]
    InvalidAddress { raw: String },

    // ── Host capabilities ────────────────────────────────────────────
    #[error("Settings error: {message}")]
    Settings { message: String },

    #[error("WiFi control failed: {message}")]
    Wifi { message: String },

    #[error("Standby control failed: {message}")]
    Standby { message: String },

    #[error("Failed to run {program}: {source}")]
    Process {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Preconditions failures are skipped silently, never shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::InvalidPreconditions { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<bluewake_api::Error> for CoreError {
    fn from(err: bluewake_api::Error) -> Self {
        match err {
            bluewake_api::Error::Timeout { member, timeout_ms } => CoreError::Timeout {
                operation: member,
                timeout: Duration::from_millis(timeout_ms),
            },
            e if e.is_unreachable() => CoreError::TransportUnreachable {
                reason: e.to_string(),
            },
            e => CoreError::Rejected {
                message: e.to_string(),
            },
        }
    }
}
