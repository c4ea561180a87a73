//! Reconnect strategy handlers: listing, selection, and `reconnect`.

use serde::Serialize;
use tabled::Tabled;

use bluewake_core::{ReconnectDelay, ReconnectOutcome, ReconnectStrategy, Severity, UiSink};

use crate::cli::{StrategyArgs, StrategyCommand};
use crate::error::CliError;
use crate::host::TerminalSink;
use crate::output;

use super::util::Spinner;
use super::{Output, Session};

// ── Views ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StrategyView {
    #[serde(flatten)]
    strategy: ReconnectStrategy,
    steps: String,
    selected: bool,
}

#[derive(Tabled)]
struct StrategyRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "ID")]
    id: &'static str,
    #[tabled(rename = "Label")]
    label: &'static str,
    #[tabled(rename = "Delay")]
    delay: String,
    #[tabled(rename = "Steps")]
    steps: String,
}

impl From<&StrategyView> for StrategyRow {
    fn from(v: &StrategyView) -> Self {
        Self {
            marker: if v.selected { "*" } else { "" },
            id: v.strategy.id,
            label: v.strategy.label,
            delay: match v.strategy.delay {
                ReconnectDelay::Manual => "manual".into(),
                ReconnectDelay::After(d) => humantime::format_duration(d).to_string(),
            },
            steps: v.steps.clone(),
        }
    }
}

fn views(session: &Session) -> Vec<StrategyView> {
    let engine = session.app.reconnect();
    let selected = engine.current_strategy().id;
    engine
        .catalogue()
        .iter()
        .map(|s| StrategyView {
            strategy: s.clone(),
            steps: s.summary(),
            selected: s.id == selected,
        })
        .collect()
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn handle(
    session: &Session,
    args: StrategyArgs,
    ui: &TerminalSink,
    out: &Output,
) -> Result<(), CliError> {
    match args.command.unwrap_or(StrategyCommand::List) {
        StrategyCommand::List => {
            let views = views(session);
            let rendered = output::render_list(
                out.format,
                &views,
                |v| StrategyRow::from(v),
                |v| v.strategy.id.to_owned(),
            );
            output::print_output(&rendered, out.quiet);
            Ok(())
        }
        StrategyCommand::Set { id } => {
            let engine = session.app.reconnect();
            let id = match id {
                Some(id) => id,
                None => pick(session, ui)?,
            };
            let strategy = engine.set_strategy(&id)?;
            ui.note(
                Severity::Success,
                &format!("Reconnect strategy: {} ({})", strategy.label, strategy.id),
            );
            Ok(())
        }
    }
}

fn pick(session: &Session, ui: &TerminalSink) -> Result<String, CliError> {
    let views = views(session);
    let labels: Vec<String> = views
        .iter()
        .map(|v| format!("{:<12} {}", v.strategy.label, v.strategy.description))
        .collect();
    let index = ui
        .select("Reconnect strategy", &labels)
        .ok_or(CliError::Cancelled)?;
    views
        .get(index)
        .map(|v| v.strategy.id.to_owned())
        .ok_or(CliError::Cancelled)
}

pub async fn reconnect(session: &Session, ui: &TerminalSink, out: &Output) -> Result<(), CliError> {
    let app = &session.app;
    let strategy = app.reconnect().current_strategy().clone();
    let prefs = app.preferences();
    let device = prefs
        .last_connected_name
        .or_else(|| prefs.last_connected_address.map(|a| a.to_string()))
        .unwrap_or_default();

    let outcome = {
        let _spinner = Spinner::start(
            ui,
            format!("Reconnecting {device} ({})", strategy.label),
            out.quiet,
        );
        app.reconnect_now().await?
    };

    match outcome {
        ReconnectOutcome::Connected => Ok(()),
        ReconnectOutcome::NotConnected => Err(CliError::ReconnectFailed {
            device,
            strategy: strategy.id.to_owned(),
        }),
        ReconnectOutcome::Cancelled => Err(CliError::Cancelled),
    }
}
