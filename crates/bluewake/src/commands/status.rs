//! `status` handler.

use serde::Serialize;

use bluewake_core::{Status, WifiControl};

use crate::error::CliError;
use crate::output;

use super::{Output, Session};

#[derive(Debug, Serialize)]
struct StatusView {
    #[serde(flatten)]
    status: Status,
    wifi_on: bool,
}

fn on_off(flag: bool) -> String {
    if flag { "on".into() } else { "off".into() }
}

fn detail(v: &StatusView) -> String {
    let s = &v.status;
    let p = &s.preferences;
    let remembered = match (&p.last_connected_name, &p.last_connected_address) {
        (Some(name), Some(address)) => format!("{name} ({address})"),
        (None, Some(address)) => address.to_string(),
        _ => "-".into(),
    };
    output::detail_lines(&[
        ("Bluetooth:", s.state.to_string()),
        ("WiFi:", on_off(v.wifi_on)),
        ("Standby:", if s.standby_suppressed { "suppressed" } else { "allowed" }.into()),
        ("Strategy:", s.strategy.clone()),
        ("Reconnect:", if s.reconnect_scheduled { "scheduled" } else { "idle" }.into()),
        ("Device:", remembered),
        ("Auto resume:", on_off(p.auto_resume_bt)),
        ("At startup:", on_off(p.startup_reconnect)),
        ("Restore WiFi:", on_off(p.auto_restore_wifi)),
    ])
}

pub async fn handle(session: &Session, out: &Output) -> Result<(), CliError> {
    let mut status = session.app.status().await;
    // The lock may belong to an earlier invocation.
    status.standby_suppressed |= session.wake_lock.is_active();

    let view = StatusView {
        status,
        wifi_on: session.wifi.is_on().await,
    };
    let rendered = output::render_single(out.format, &view, detail, |v| {
        v.status.state.to_string()
    });
    output::print_output(&rendered, out.quiet);
    Ok(())
}
