//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod config_cmd;
pub mod daemon;
pub mod devices;
pub mod power;
pub mod settings;
pub mod status;
pub mod strategy;
pub mod util;

use std::io;
use std::sync::Arc;

use bluewake_api::BusClient;
use bluewake_config::{Config, SettingsFile};
use bluewake_core::{Host, PowerCoordinator, ShellRunner, StepRunner, UiSink};

use crate::cli::{ColorMode, Command, GlobalOpts, OutputFormat};
use crate::control::HookEvent;
use crate::error::CliError;
use crate::host::{CommandWifi, TerminalSink, WakeLock};
use crate::output::should_color;

pub type App = PowerCoordinator<BusClient, CommandWifi>;

// ── Session ──────────────────────────────────────────────────────────

/// A coordinator wired to the real host, plus the handles commands need
/// directly.
pub struct Session {
    pub app: App,
    pub settings: Arc<SettingsFile>,
    pub wifi: Arc<CommandWifi>,
    pub wake_lock: Arc<WakeLock>,
}

impl Session {
    /// Wire up a coordinator. Makes no radio calls.
    pub fn open(cfg: &Config, ui: Arc<dyn UiSink>, inline: bool) -> Result<Self, CliError> {
        let transport = Arc::new(BusClient::new(cfg.transport_config()?));
        let settings = Arc::new(SettingsFile::open(cfg.settings_path())?);
        let wifi = Arc::new(CommandWifi::from_config(&cfg.wifi));
        let wake_lock = Arc::new(WakeLock::from_config(&cfg.standby));

        let runner = if inline {
            StepRunner::inline(Arc::clone(&transport))
        } else {
            StepRunner::Shell(ShellRunner::new(cfg.dbus_send()?, cfg.strategy_ceiling()))
        };

        let app = PowerCoordinator::new(
            cfg.core_config(),
            Host {
                transport,
                wifi: Arc::clone(&wifi),
                settings: settings.clone(),
                standby: wake_lock.clone(),
                ui,
                runner,
            },
        );
        Ok(Self {
            app,
            settings,
            wifi,
            wake_lock,
        })
    }
}

// ── Output options ───────────────────────────────────────────────────

/// Output settings resolved from flags and the config file.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    pub yes: bool,
}

impl Output {
    pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Self {
        use clap::ValueEnum;

        let format = global.output.unwrap_or_else(|| {
            OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
        });
        let color = global.color.unwrap_or_else(|| {
            ColorMode::from_str(&cfg.defaults.color, true).unwrap_or(ColorMode::Auto)
        });
        Self {
            format,
            color: should_color(color, &io::stderr()),
            quiet: global.quiet,
            yes: global.yes,
        }
    }

    pub fn terminal(&self) -> Arc<TerminalSink> {
        Arc::new(TerminalSink::new(self.color, self.quiet))
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

/// Dispatch a command that needs configuration to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let out = Output::resolve(global, cfg);

    match cmd {
        // Preferences only; no radio
        Command::Settings(args) => settings::handle(args, cfg, &out),
        Command::Daemon(args) => daemon::run(args, cfg).await,
        Command::Suspend(args) => daemon::notify(HookEvent::Suspend, args, cfg).await,
        Command::Resume(args) => daemon::notify(HookEvent::Resume, args, cfg).await,
        cmd => {
            let terminal = out.terminal();
            let session = Session::open(cfg, terminal.clone(), false)?;
            let result = run_interactive(cmd, &session, terminal.as_ref(), &out).await;
            session.app.shutdown().await;
            result
        }
    }
}

async fn run_interactive(
    cmd: Command,
    session: &Session,
    ui: &TerminalSink,
    out: &Output,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(session, out).await,
        Command::On => power::on(session, ui, out).await,
        Command::Off => power::off(session, ui, out).await,
        Command::Devices(args) => devices::list(session, args, out).await,
        Command::Scan(args) => devices::scan(session, args, ui, out).await,
        Command::Connect(args) => devices::connect(session, args, ui, out).await,
        Command::Disconnect(args) => devices::disconnect(session, args, ui).await,
        Command::Reconnect => strategy::reconnect(session, ui, out).await,
        Command::Strategy(args) => strategy::handle(session, args, ui, out),
        // Handled before a session is opened
        Command::Settings(_)
        | Command::Daemon(_)
        | Command::Suspend(_)
        | Command::Resume(_)
        | Command::Config(_)
        | Command::Completions(_) => unreachable!("handled before dispatch"),
    }
}
