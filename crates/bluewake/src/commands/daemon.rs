//! `daemon`: long-running host integration.
//!
//! Host suspend/resume hooks reach the daemon through its control socket
//! (`bluewake suspend` / `bluewake resume`, which wait for the hook to
//! finish) or by signal:
//!
//! - `SIGUSR1` -- the device is about to suspend
//! - `SIGUSR2` -- the device has resumed
//! - `SIGTERM` / `SIGINT` -- shut down

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use bluewake_config::Config;
use bluewake_core::{AdapterState, TracingSink};

use crate::cli::{DaemonArgs, HookArgs};
use crate::control::{self, ControlSocket, HookEvent};
use crate::error::CliError;

use super::{App, Session};

/// Removes the pid file on drop.
struct PidFile(PathBuf);

impl PidFile {
    fn create(path: &Path) -> Result<Self, CliError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("{}\n", std::process::id()))?;
        Ok(Self(path.to_path_buf()))
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!(path = %self.0.display(), error = %e, "failed to remove pid file");
        }
    }
}

pub async fn run(args: DaemonArgs, cfg: &Config) -> Result<(), CliError> {
    let session = Session::open(cfg, Arc::new(TracingSink), args.inline)?;
    let app = &session.app;

    let mut suspend = signal(SignalKind::user_defined1())?;
    let mut resume = signal(SignalKind::user_defined2())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let _pid_file = args.pid_file.as_deref().map(PidFile::create).transpose()?;
    let socket = ControlSocket::bind(&args.socket.unwrap_or_else(|| cfg.socket_path()))?;
    let (requests_tx, mut requests) = mpsc::channel(8);

    info!(
        pid = std::process::id(),
        adapter = %app.config().adapter_path,
        strategy = app.reconnect().current_strategy().id,
        socket = %socket.path().display(),
        "daemon started"
    );

    if session.wake_lock.is_active() {
        app.adapter().standby().acquire();
    }
    app.on_startup().await;
    if app.adapter().state() != AdapterState::On {
        // Stale lock from a previous run.
        app.adapter().standby().release();
    }

    let mut state = app.state();
    loop {
        tokio::select! {
            _ = suspend.recv() => handle(app, HookEvent::Suspend).await,
            _ = resume.recv() => handle(app, HookEvent::Resume).await,
            accepted = socket.accept() => match accepted {
                Ok(stream) => {
                    tokio::spawn(control::serve_connection(stream, requests_tx.clone()));
                }
                Err(e) => warn!(error = %e, "control socket accept failed"),
            },
            Some(request) = requests.recv() => {
                handle(app, request.event).await;
                if request.done.send(()).is_err() {
                    debug!(event = request.event.as_str(), "hook client went away");
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                debug!(state = %current, "adapter state changed");
            }
            _ = terminate.recv() => break,
            _ = interrupt.recv() => break,
        }
    }

    info!("shutting down");
    app.shutdown().await;
    Ok(())
}

async fn handle(app: &App, event: HookEvent) {
    info!(event = event.as_str(), "host event");
    match event {
        HookEvent::Suspend => app.on_suspend().await,
        HookEvent::Resume => app.on_resume().await,
    }
}

/// `suspend` / `resume`: forward a host event to the running daemon.
pub async fn notify(event: HookEvent, args: HookArgs, cfg: &Config) -> Result<(), CliError> {
    let path = args.socket.unwrap_or_else(|| cfg.socket_path());
    control::notify(&path, event, args.timeout).await
}
