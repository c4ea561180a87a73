// ── Host capabilities ──
//
// The binary's implementations of the traits the core asks the host for:
// WiFi switching through configured commands, standby suppression through
// the kernel wake-lock files, and terminal presentation.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dialoguer::{Confirm, Select};
use indicatif::ProgressBar;
use tokio::process::Command;
use tracing::{debug, warn};

use bluewake_config::{StandbySection, WifiSection};
use bluewake_core::{CoreError, Notification, Severity, StandbyControl, UiSink, WifiControl};

use crate::output::status_line;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// ── WiFi ────────────────────────────────────────────────────────────

/// WiFi control via `/sys/class/net/<iface>/operstate` and shell commands.
#[derive(Debug, Clone)]
pub struct CommandWifi {
    interface: String,
    on_command: Vec<String>,
    off_command: Vec<String>,
    sysfs_net: PathBuf,
}

impl CommandWifi {
    pub fn from_config(section: &WifiSection) -> Self {
        Self {
            interface: section.interface.clone(),
            on_command: section.on_command.clone(),
            off_command: section.off_command.clone(),
            sysfs_net: PathBuf::from("/sys/class/net"),
        }
    }

    #[cfg(test)]
    fn with_sysfs_net(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_net = root.into();
        self
    }

    async fn run(&self, argv: &[String]) -> Result<(), CoreError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(CoreError::Wifi {
                message: "no command configured".into(),
            });
        };
        debug!(%program, ?args, "wifi command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CoreError::Process {
                program: program.clone(),
                source,
            })?;

        let status = tokio::time::timeout(COMMAND_TIMEOUT, child.wait())
            .await
            .map_err(|_| CoreError::Timeout {
                operation: program.clone(),
                timeout: COMMAND_TIMEOUT,
            })?
            .map_err(|source| CoreError::Process {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CoreError::Wifi {
                message: format!("{} exited with {status}", argv.join(" ")),
            })
        }
    }
}

impl WifiControl for CommandWifi {
    async fn is_on(&self) -> bool {
        let path = self.sysfs_net.join(&self.interface).join("operstate");
        match tokio::fs::read_to_string(&path).await {
            Ok(state) => state.trim() == "up",
            Err(e) => {
                debug!(path = %path.display(), error = %e, "operstate unreadable; treating wifi as off");
                false
            }
        }
    }

    async fn turn_on(&self) -> Result<(), CoreError> {
        self.run(&self.on_command).await
    }

    async fn turn_off(&self) -> Result<(), CoreError> {
        self.run(&self.off_command).await
    }
}

// ── Standby ─────────────────────────────────────────────────────────

/// Standby suppression through `/sys/power/wake_lock`.
#[derive(Debug, Clone)]
pub struct WakeLock {
    section: StandbySection,
}

impl WakeLock {
    pub fn from_config(section: &StandbySection) -> Self {
        Self {
            section: section.clone(),
        }
    }

    /// Whether the kernel lists our lock as active. Lets a fresh process
    /// adopt a lock taken by an earlier invocation.
    pub fn is_active(&self) -> bool {
        if !self.section.enabled {
            return false;
        }
        std::fs::read_to_string(&self.section.lock_path).is_ok_and(|active| {
            active
                .split_whitespace()
                .any(|name| name == self.section.lock_name)
        })
    }

    fn write(&self, path: &Path) -> Result<(), CoreError> {
        if !self.section.enabled {
            return Ok(());
        }
        std::fs::write(path, &self.section.lock_name).map_err(|e| CoreError::Standby {
            message: format!("{}: {e}", path.display()),
        })
    }
}

impl StandbyControl for WakeLock {
    fn suppress(&self) -> Result<(), CoreError> {
        self.write(&self.section.lock_path)
    }

    fn allow(&self) -> Result<(), CoreError> {
        self.write(&self.section.unlock_path)
    }
}

// ── Terminal UI ─────────────────────────────────────────────────────

/// Presents notifications on stderr and prompts through dialoguer.
///
/// While a spinner is attached, lines are printed through it so the
/// spinner is redrawn below them instead of being overwritten.
#[derive(Debug, Clone)]
pub struct TerminalSink {
    color: bool,
    quiet: bool,
    spinner: Arc<Mutex<Option<ProgressBar>>>,
}

impl TerminalSink {
    pub fn new(color: bool, quiet: bool) -> Self {
        Self {
            color,
            quiet,
            spinner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn attach(&self, bar: &ProgressBar) {
        *self.lock_spinner() = Some(bar.clone());
    }

    pub fn detach(&self) {
        self.lock_spinner().take();
    }

    /// Print a status line. Quiet mode keeps warnings only.
    pub fn note(&self, severity: Severity, message: &str) {
        if self.quiet && severity != Severity::Warning {
            return;
        }
        let line = status_line(severity, message, self.color);
        let spinner = self.lock_spinner().clone();
        match spinner {
            Some(bar) => bar.suspend(|| eprintln!("{line}")),
            None => eprintln!("{line}"),
        }
    }

    fn lock_spinner(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn interactive() -> bool {
        io::stdin().is_terminal() && io::stderr().is_terminal()
    }
}

impl UiSink for TerminalSink {
    fn show_message(&self, notification: &Notification) {
        self.note(notification.severity(), &notification.to_string());
    }

    fn confirm(&self, prompt: &str) -> bool {
        if !Self::interactive() {
            return false;
        }
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "confirmation prompt failed");
                false
            })
    }

    fn select(&self, title: &str, items: &[String]) -> Option<usize> {
        if !Self::interactive() || items.is_empty() {
            return None;
        }
        Select::new()
            .with_prompt(title)
            .items(items)
            .default(0)
            .interact_opt()
            .unwrap_or_else(|e| {
                warn!(error = %e, "selection prompt failed");
                None
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wifi(on: &[&str], off: &[&str]) -> CommandWifi {
        CommandWifi::from_config(&WifiSection {
            interface: "wlan0".into(),
            on_command: on.iter().map(ToString::to_string).collect(),
            off_command: off.iter().map(ToString::to_string).collect(),
        })
    }

    #[tokio::test]
    async fn operstate_up_means_on() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("wlan0")).unwrap();
        std::fs::write(dir.path().join("wlan0/operstate"), "up\n").unwrap();

        let wifi = wifi(&["true"], &["true"]).with_sysfs_net(dir.path());
        assert!(wifi.is_on().await);

        std::fs::write(dir.path().join("wlan0/operstate"), "down\n").unwrap();
        assert!(!wifi.is_on().await);
    }

    #[tokio::test]
    async fn missing_interface_reads_as_off() {
        let dir = tempfile::tempdir().unwrap();
        let wifi = wifi(&["true"], &["true"]).with_sysfs_net(dir.path());
        assert!(!wifi.is_on().await);
    }

    #[tokio::test]
    async fn failing_command_is_a_wifi_error() {
        let wifi = wifi(&["true"], &["false"]);
        assert!(wifi.turn_on().await.is_ok());
        let err = wifi.turn_off().await.unwrap_err();
        assert!(matches!(err, CoreError::Wifi { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = wifi(&[], &[]).turn_on().await.unwrap_err();
        assert!(matches!(err, CoreError::Wifi { .. }), "{err:?}");
    }

    fn wake_lock(dir: &std::path::Path, enabled: bool) -> WakeLock {
        WakeLock::from_config(&StandbySection {
            enabled,
            lock_path: dir.join("wake_lock"),
            unlock_path: dir.join("wake_unlock"),
            lock_name: "bluewake".into(),
        })
    }

    #[test]
    fn wake_lock_writes_name() {
        let dir = tempfile::tempdir().unwrap();
        let lock = wake_lock(dir.path(), true);

        lock.suppress().unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("wake_lock")).unwrap(),
            "bluewake"
        );
        assert!(lock.is_active());

        lock.allow().unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("wake_unlock")).unwrap(),
            "bluewake"
        );
    }

    #[test]
    fn disabled_wake_lock_is_inert() {
        let dir = tempfile::tempdir().unwrap();
        let lock = wake_lock(dir.path(), false);
        lock.suppress().unwrap();
        assert!(!dir.path().join("wake_lock").exists());
        assert!(!lock.is_active());
    }
}
