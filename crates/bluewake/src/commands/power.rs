//! `on` / `off` handlers.

use bluewake_core::{AdapterState, EnableOutcome, Severity};

use crate::error::CliError;
use crate::host::TerminalSink;

use super::util::{self, Spinner};
use super::{Output, Session};

pub async fn on(session: &Session, ui: &TerminalSink, out: &Output) -> Result<(), CliError> {
    let app = &session.app;
    let was_on = app.adapter().is_enabled().await;

    let outcome = {
        let _spinner = Spinner::start(ui, "Turning Bluetooth on", out.quiet);
        app.enable().outcome().await
    };

    match outcome {
        EnableOutcome::Enabled => {
            if was_on {
                ui.note(Severity::Info, "Bluetooth already on");
            }
            Ok(())
        }
        EnableOutcome::TimedOut => Err(CliError::EnableTimedOut {
            seconds: app.config().enable_policy.budget().as_secs_f64(),
        }),
        EnableOutcome::Aborted => Err(CliError::Cancelled),
    }
}

pub async fn off(session: &Session, ui: &TerminalSink, out: &Output) -> Result<(), CliError> {
    let app = &session.app;
    adopt_wake_lock(session);

    if app.adapter().refresh_state().await == AdapterState::Off {
        app.disable().await;
        ui.note(Severity::Info, "Bluetooth already off");
        return Ok(());
    }

    let connected = app
        .directory()
        .list()
        .await
        .map(|devices| devices.into_iter().find(|d| d.connected))
        .unwrap_or_default();
    if let Some(device) = connected {
        let prompt = format!(
            "{} is connected. Turn Bluetooth off anyway?",
            device.display_name()
        );
        if !util::confirm(ui, &prompt, out.yes)? {
            return Err(CliError::Cancelled);
        }
    }

    app.disable().await;
    Ok(())
}

/// A wake lock taken by an earlier invocation is ours to release.
fn adopt_wake_lock(session: &Session) {
    if session.wake_lock.is_active() {
        session.app.adapter().standby().acquire();
    }
}
