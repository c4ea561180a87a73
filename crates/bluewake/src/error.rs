//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use bluewake_config::ConfigError;
use bluewake_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Radio ────────────────────────────────────────────────────────
    #[error("Bluetooth daemon unreachable: {reason}")]
    #[diagnostic(
        code(bluewake::unreachable),
        help(
            "Check that bluetoothd is running and the message bus is reachable.\n\
             The transport is configured under [transport] in: bluewake config path"
        )
    )]
    Unreachable { reason: String },

    #[error("Bluetooth is off")]
    #[diagnostic(code(bluewake::radio_off), help("Run: bluewake on"))]
    RadioOff,

    #[error("Bluetooth did not come up within {seconds:.1}s")]
    #[diagnostic(
        code(bluewake::enable_timeout),
        help(
            "The firmware may still be loading. Try again, or raise\n\
             timing.enable_attempts in the config file."
        )
    )]
    EnableTimedOut { seconds: f64 },

    #[error("{operation} timed out after {millis}ms")]
    #[diagnostic(code(bluewake::timeout))]
    Timeout { operation: String, millis: u128 },

    #[error("Radio rejected the request: {message}")]
    #[diagnostic(code(bluewake::rejected))]
    Rejected { message: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(bluewake::not_found),
        help("Run: bluewake {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No paired devices")]
    #[diagnostic(
        code(bluewake::no_devices),
        help("Pair the device first, then run: bluewake devices --paired")
    )]
    NoDevices,

    // ── Reconnect ────────────────────────────────────────────────────
    #[error("{device} did not reconnect using '{strategy}'")]
    #[diagnostic(
        code(bluewake::reconnect_failed),
        help(
            "Heavier strategies reset more of the stack.\n\
             Run: bluewake strategy list"
        )
    )]
    ReconnectFailed { device: String, strategy: String },

    #[error("{reason}")]
    #[diagnostic(
        code(bluewake::nothing_to_do),
        help("Connect a device once so it is remembered: bluewake connect")
    )]
    NothingToDo { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bluewake::validation))]
    Validation { field: String, reason: String },

    #[error("Unknown setting '{key}'")]
    #[diagnostic(code(bluewake::unknown_setting), help("Known settings: {known}"))]
    UnknownSetting { key: String, known: String },

    // ── Host ─────────────────────────────────────────────────────────
    #[error("Host control failed: {message}")]
    #[diagnostic(code(bluewake::host))]
    Host { message: String },

    #[error("Daemon not reachable at {path}: {reason}")]
    #[diagnostic(
        code(bluewake::daemon_unreachable),
        help(
            "Start it with: bluewake daemon\n\
             The socket location is daemon.socket in: bluewake config path"
        )
    )]
    DaemonUnreachable { path: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(bluewake::config),
        help("Inspect the effective configuration with: bluewake config show")
    )]
    Config(Box<ConfigError>),

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(bluewake::config_exists),
        help("Pass --yes to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(bluewake::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Cancelled")]
    #[diagnostic(code(bluewake::cancelled))]
    Cancelled,

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(Box::new(err))
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TransportUnreachable { reason } => Self::Unreachable { reason },
            CoreError::Rejected { message } => Self::Rejected { message },
            CoreError::Timeout { operation, timeout } => Self::Timeout {
                operation,
                millis: timeout.as_millis(),
            },
            CoreError::VerificationFailed { address, strategy } => Self::ReconnectFailed {
                device: address,
                strategy,
            },
            CoreError::InvalidPreconditions { reason } => Self::NothingToDo { reason },
            CoreError::UnknownStrategy { id } => Self::NotFound {
                resource_type: "strategy".into(),
                identifier: id,
                list_command: "strategy list".into(),
            },
            CoreError::DeviceNotFound { identifier } => Self::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices".into(),
            },
            CoreError::InvalidAddress { raw } => Self::Validation {
                field: "address".into(),
                reason: format!("'{raw}' is not a Bluetooth address (AA:BB:CC:DD:EE:FF)"),
            },
            CoreError::Settings { message } => Self::Validation {
                field: "settings".into(),
                reason: message,
            },
            CoreError::Wifi { message } | CoreError::Standby { message } => {
                Self::Host { message }
            }
            CoreError::Process { program, source } => Self::Host {
                message: format!("{program}: {source}"),
            },
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::DaemonUnreachable { .. } => exit_code::CONNECTION,
            Self::EnableTimedOut { .. } | Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } | Self::NoDevices => exit_code::NOT_FOUND,
            Self::RadioOff | Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::UnknownSetting { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Rejected { .. }
            | Self::ReconnectFailed { .. }
            | Self::NothingToDo { .. }
            | Self::Host { .. }
            | Self::Config(_)
            | Self::Cancelled
            | Self::Io(_) => exit_code::GENERAL,
        }
    }
}
