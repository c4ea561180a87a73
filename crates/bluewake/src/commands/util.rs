//! Shared helpers for command handlers.

use std::borrow::Cow;
use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use bluewake_core::{Device, MacAddress, UiSink};

use crate::error::CliError;
use crate::host::TerminalSink;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(ui: &dyn UiSink, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    Ok(ui.confirm(message))
}

/// Spinner on stderr while a slow operation runs. Hidden in quiet mode and
/// when stderr is not a terminal; cleared on drop.
pub struct Spinner<'a> {
    bar: ProgressBar,
    ui: &'a TerminalSink,
}

impl<'a> Spinner<'a> {
    pub fn start(ui: &'a TerminalSink, message: impl Into<Cow<'static, str>>, quiet: bool) -> Self {
        if quiet {
            return Self {
                bar: ProgressBar::hidden(),
                ui,
            };
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
            .template("{spinner} {msg}")
        {
            bar.set_style(style);
        }
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        ui.attach(&bar);
        Self { bar, ui }
    }
}

impl Drop for Spinner<'_> {
    fn drop(&mut self) {
        self.ui.detach();
        self.bar.finish_and_clear();
    }
}

/// Parse an address argument, or let the user pick from `candidates`.
pub fn resolve_address(
    ui: &dyn UiSink,
    raw: Option<&str>,
    candidates: &[Device],
    title: &str,
) -> Result<MacAddress, CliError> {
    if let Some(raw) = raw {
        return Ok(MacAddress::parse(raw)?);
    }
    let interactive = io::stdin().is_terminal();
    match candidates {
        [] => Err(CliError::NoDevices),
        [only] if !interactive => Ok(only.address.clone()),
        _ if !interactive => Err(CliError::Validation {
            field: "address".into(),
            reason: "required when stdin is not a terminal".into(),
        }),
        _ => {
            let labels: Vec<String> = candidates
                .iter()
                .map(|d| format!("{}  {}", d.label(), d.address))
                .collect();
            let index = ui.select(title, &labels).ok_or(CliError::Cancelled)?;
            candidates
                .get(index)
                .map(|d| d.address.clone())
                .ok_or(CliError::Cancelled)
        }
    }
}

/// `1s 500ms`-style rendering for durations shown to the user.
pub fn human(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}
