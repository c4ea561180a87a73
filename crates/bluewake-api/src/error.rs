use thiserror::Error;

/// D-Bus error names meaning "nobody is there to answer".
const UNREACHABLE_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
    "org.freedesktop.DBus.Error.NoReply",
    "org.freedesktop.DBus.Error.Disconnected",
];

/// Top-level error type for the `bluewake-api` crate.
///
/// Covers every way a single radio call can fail: no bus connection, the
/// call hung past its deadline, the daemon answered with an error, or the
/// reply carried the wrong type. `bluewake-core` folds these into its own
/// taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The message bus could not be reached at all.
    #[error("cannot connect to the {bus} bus: {source}")]
    Connect {
        bus: String,
        #[source]
        source: zbus::Error,
    },

    /// The call did not return before the per-call deadline.
    #[error("{member} timed out after {timeout_ms}ms")]
    Timeout { member: String, timeout_ms: u64 },

    // ── Remote ──────────────────────────────────────────────────────
    /// The daemon replied with a D-Bus error (unknown object, method failure).
    #[error("{member} failed: {name}: {message}")]
    CallFailed {
        member: String,
        name: String,
        message: String,
    },

    /// The call failed on our side of the bus (I/O, marshalling).
    #[error("{member}: {source}")]
    Bus {
        member: String,
        #[source]
        source: zbus::Error,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// The reply decoded fine but carried the wrong type.
    #[error("unexpected reply to {member}: expected {expected}")]
    UnexpectedReply {
        member: String,
        expected: &'static str,
    },
}

impl Error {
    /// The call never reached the radio daemon: no bus, no daemon on it,
    /// a dropped connection, or the deadline passed.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => true,
            Self::CallFailed { name, .. } => UNREACHABLE_ERRORS.contains(&name.as_str()),
            Self::Bus { source, .. } => matches!(source, zbus::Error::InputOutput(_)),
            Self::UnexpectedReply { .. } => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Classify a failed call: error replies keep their D-Bus name.
    pub(crate) fn from_call(member: &str, source: zbus::Error) -> Self {
        match source {
            zbus::Error::MethodError(name, message, _) => Self::CallFailed {
                member: member.to_owned(),
                name: name.as_str().to_owned(),
                message: message.unwrap_or_default(),
            },
            source => Self::Bus {
                member: member.to_owned(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(name: &str) -> Error {
        Error::CallFailed {
            member: "org.bluez.Device1.Connect".into(),
            name: name.into(),
            message: String::new(),
        }
    }

    #[test]
    fn missing_service_is_unreachable() {
        assert!(failed("org.freedesktop.DBus.Error.ServiceUnknown").is_unreachable());
        assert!(!failed("org.bluez.Error.Failed").is_unreachable());
    }

    #[test]
    fn timeout_is_unreachable() {
        let err = Error::Timeout {
            member: "connect".into(),
            timeout_ms: 500,
        };
        assert!(err.is_unreachable());
        assert!(err.is_timeout());
    }
}
