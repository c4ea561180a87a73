//! Daemon control socket.
//!
//! Suspend and resume hooks that must not race the daemon connect here
//! instead of sending a signal. One request line per connection:
//!
//! - `suspend` -- the device is about to sleep
//! - `resume` -- the device is awake again
//!
//! The daemon answers `ok` once the hook has run to completion, or
//! `error <reason>`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::CliError;

/// How long the daemon waits for a connected client to send its request.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Suspend,
    Resume,
}

impl HookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
        }
    }

    fn parse(line: &str) -> Option<Self> {
        match line {
            "suspend" => Some(Self::Suspend),
            "resume" => Some(Self::Resume),
            _ => None,
        }
    }
}

/// A hook request waiting for the daemon loop. Dropping `done` without
/// sending reports failure to the client.
#[derive(Debug)]
pub struct Request {
    pub event: HookEvent,
    pub done: oneshot::Sender<()>,
}

// ── Server ───────────────────────────────────────────────────────────

/// Listening socket. Removes the socket file on drop.
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlSocket {
    pub fn bind(path: &Path) -> Result<Self, CliError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale control socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn accept(&self) -> io::Result<UnixStream> {
        self.listener.accept().await.map(|(stream, _)| stream)
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove control socket");
        }
    }
}

/// Read one request from `stream`, hand it to the daemon loop, and reply
/// once the loop has acknowledged it.
pub async fn serve_connection(stream: UnixStream, requests: mpsc::Sender<Request>) {
    let (read, mut write) = stream.into_split();
    let mut line = String::new();
    let reply = match tokio::time::timeout(
        REQUEST_READ_TIMEOUT,
        BufReader::new(read).read_line(&mut line),
    )
    .await
    {
        Ok(Ok(_)) => dispatch(line.trim(), &requests).await,
        Ok(Err(e)) => format!("error {e}"),
        Err(_) => "error no request received".to_owned(),
    };
    if let Err(e) = write.write_all(format!("{reply}\n").as_bytes()).await {
        debug!(error = %e, "control client went away before the reply");
    }
}

async fn dispatch(line: &str, requests: &mpsc::Sender<Request>) -> String {
    let Some(event) = HookEvent::parse(line) else {
        return format!("error unknown request '{line}'");
    };
    let (done, acked) = oneshot::channel();
    if requests.send(Request { event, done }).await.is_err() {
        return "error daemon is shutting down".to_owned();
    }
    match acked.await {
        Ok(()) => "ok".to_owned(),
        Err(_) => "error daemon is shutting down".to_owned(),
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Send `event` to the daemon at `path` and wait up to `wait` for it to
/// finish handling it.
pub async fn notify(path: &Path, event: HookEvent, wait: Duration) -> Result<(), CliError> {
    let exchange = async {
        let mut stream =
            UnixStream::connect(path)
                .await
                .map_err(|e| CliError::DaemonUnreachable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
        stream
            .write_all(format!("{}\n", event.as_str()).as_bytes())
            .await?;
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).await?;
        parse_reply(line.trim())
    };
    tokio::time::timeout(wait, exchange)
        .await
        .map_err(|_| CliError::Timeout {
            operation: format!("daemon {}", event.as_str()),
            millis: wait.as_millis(),
        })?
}

fn parse_reply(line: &str) -> Result<(), CliError> {
    match line {
        "ok" => Ok(()),
        "" => Err(CliError::Host {
            message: "daemon closed the connection without replying".into(),
        }),
        other => Err(CliError::Host {
            message: other.strip_prefix("error ").unwrap_or(other).to_owned(),
        }),
    }
}
