mod cli;
mod commands;
mod control;
mod error;
mod host;
mod output;

use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bluewake_config::{Config, load_config, load_config_from};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(verbosity))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Daemon logging: `info` by default, optionally to a file and/or as JSON.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_daemon_tracing(
    verbosity: u8,
    file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>, CliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level(verbosity.saturating_add(1))));

    let Some(file) = file else {
        let layer = fmt::layer().with_writer(std::io::stderr);
        if json {
            tracing_subscriber::registry().with(filter).with(layer.json()).init();
        } else {
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        return Ok(None);
    };

    let dir = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = file.file_name().ok_or_else(|| CliError::Validation {
        field: "log.file".into(),
        reason: format!("'{}' does not name a file", file.display()),
    })?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
    if json {
        tracing_subscriber::registry().with(filter).with(layer.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
    Ok(Some(guard))
}

fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = match global.config {
        Some(ref path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(cfg)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "bluewake", &mut std::io::stdout());
            Ok(())
        }

        // Config commands work even when the file is broken
        Command::Config(args) => {
            init_tracing(cli.global.verbose);
            commands::config_cmd::handle(args, &cli.global)
        }

        Command::Daemon(ref args) => {
            let cfg = load(&cli.global)?;
            let log_file = args.log_file.as_deref().or(cfg.log.file.as_deref());
            let _guard = init_daemon_tracing(cli.global.verbose, log_file, cfg.log.json)?;
            commands::dispatch(cli.command, &cfg, &cli.global).await
        }

        cmd => {
            init_tracing(cli.global.verbose);
            let cfg = load(&cli.global)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &cfg, &cli.global).await
        }
    }
}
