//! Clap derive structures for the `bluewake` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bluewake -- Bluetooth power and reconnect control for e-readers
#[derive(Debug, Parser)]
#[command(
    name = "bluewake",
    version,
    about = "Bluetooth power and reconnect control for shared-firmware e-readers",
    long_about = "Turns the Bluetooth radio on and off alongside WiFi, keeps the device\n\
        awake while the radio is up, and brings a remembered remote back after\n\
        suspend using a selectable reconnect strategy.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "BLUEWAKE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (defaults to the config file's setting, then table)
    #[arg(long, short = 'o', env = "BLUEWAKE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output (defaults to the config file's setting, then auto)
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show radio, standby, and reconnect state
    #[command(alias = "st")]
    Status,

    /// Turn Bluetooth on and wait for the radio to confirm
    On,

    /// Turn Bluetooth off
    Off,

    /// List devices known to the radio
    #[command(alias = "dev", alias = "ls")]
    Devices(DevicesArgs),

    /// Discover nearby devices
    Scan(ScanArgs),

    /// Connect a device and remember it for reconnects
    Connect(DeviceTarget),

    /// Disconnect a device
    Disconnect(DeviceTarget),

    /// Run the selected reconnect strategy now
    Reconnect,

    /// List or select reconnect strategies
    #[command(alias = "strategies")]
    Strategy(StrategyArgs),

    /// Inspect and change stored preferences
    Settings(SettingsArgs),

    /// Run in the background, reacting to suspend and resume signals
    Daemon(DaemonArgs),

    /// Tell the daemon the device is about to sleep; returns once it is safe
    Suspend(HookArgs),

    /// Tell the daemon the device has woken up
    Resume(HookArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Only paired devices
    #[arg(long, short = 'p')]
    pub paired: bool,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// How long to scan (e.g. "8s", "1m")
    #[arg(long, short = 'd', default_value = "8s", value_parser = humantime::parse_duration)]
    pub duration: Duration,
}

#[derive(Debug, Args)]
pub struct DeviceTarget {
    /// Device address (AA:BB:CC:DD:EE:FF). Prompts when omitted.
    pub address: Option<String>,
}

// ── Strategies ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StrategyArgs {
    #[command(subcommand)]
    pub command: Option<StrategyCommand>,
}

#[derive(Debug, Subcommand)]
pub enum StrategyCommand {
    /// List strategies (default)
    List,
    /// Select the strategy used after resume
    Set {
        /// Strategy id, e.g. "power_cycle". Prompts when omitted.
        id: Option<String>,
    },
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: Option<SettingsCommand>,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show every stored preference (default)
    List,
    /// Print one preference
    Get { key: String },
    /// Store a preference
    Set { key: String, value: String },
    /// Delete a preference
    Unset { key: String },
    /// Forget the remembered reconnect device
    ForgetDevice,
}

// ── Daemon ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DaemonArgs {
    /// Write the process id here so hooks can signal the daemon
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Log file (overrides the config file's `log.file`)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Run strategies in process instead of through `sh`
    #[arg(long)]
    pub inline: bool,

    /// Control socket (overrides the config file's `daemon.socket`)
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct HookArgs {
    /// Control socket (overrides the config file's `daemon.socket`)
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// How long to wait for the daemon (e.g. "30s", "2m")
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,
}

// ── Config / Completions ─────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write a config file with every default spelled out
    Init,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
