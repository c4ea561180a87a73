// ── Strategy runners ──
//
// Strategies contain multi-second sleeps and restart host daemons, so the
// production runner executes them out of process: the plan is rendered to a
// POSIX shell script and handed to `sh -c`. The coordinator waits for the
// script to exit but never kills it. The inline runner interprets the same
// steps on the async runtime against the transport.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bluewake_api::{Bus, ObjectPath, RadioTransport, bluez};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::strategy::Step;

/// Executes a resolved plan.
pub enum StepRunner<T> {
    Shell(ShellRunner),
    Inline(InlineRunner<T>),
}

impl<T: RadioTransport> StepRunner<T> {
    pub fn inline(transport: Arc<T>) -> Self {
        Self::Inline(InlineRunner::new(transport))
    }

    /// Run every step. Individual step failures are logged and skipped;
    /// an error means the runner itself could not start.
    pub async fn run(&self, steps: &[Step]) -> Result<(), CoreError> {
        match self {
            Self::Shell(shell) => shell.run(steps).await,
            Self::Inline(inline) => {
                inline.run(steps).await;
                Ok(())
            }
        }
    }
}

// ── dbus-send rendering ─────────────────────────────────────────────

/// How a script reaches the radio: one `dbus-send` invocation per remote
/// step, so the steps keep working after the coordinator stops waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbusSendCommand {
    pub program: PathBuf,
    pub service: String,
    pub bus: Bus,
    pub reply_timeout: Duration,
}

impl Default for DbusSendCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dbus-send"),
            service: bluez::SERVICE.into(),
            bus: Bus::System,
            reply_timeout: Duration::from_secs(5),
        }
    }
}

impl DbusSendCommand {
    pub fn set_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
        value: bool,
    ) -> Vec<String> {
        self.argv(
            path,
            &format!("{}.Set", bluez::PROPERTIES_INTERFACE),
            [
                format!("string:{interface}"),
                format!("string:{name}"),
                format!("variant:boolean:{value}"),
            ],
        )
    }

    pub fn invoke(&self, path: &ObjectPath, interface: &str, method: &str) -> Vec<String> {
        self.argv(path, &format!("{interface}.{method}"), [])
    }

    fn argv<const N: usize>(&self, path: &ObjectPath, member: &str, body: [String; N]) -> Vec<String> {
        let bus = match self.bus {
            Bus::System => "--system",
            Bus::Session => "--session",
        };
        let mut argv = vec![
            self.program.display().to_string(),
            bus.to_owned(),
            "--print-reply".to_owned(),
            format!("--reply-timeout={}", self.reply_timeout.as_millis()),
            format!("--dest={}", self.service),
            path.to_string(),
            member.to_owned(),
        ];
        argv.extend(body);
        argv
    }
}

// ── Shell runner ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShellRunner {
    dbus: DbusSendCommand,
    shell: PathBuf,
    ceiling: Duration,
}

impl ShellRunner {
    /// `ceiling` bounds how long the coordinator waits for the script; the
    /// script itself keeps running past it.
    pub fn new(dbus: DbusSendCommand, ceiling: Duration) -> Self {
        Self {
            dbus,
            shell: PathBuf::from("/bin/sh"),
            ceiling,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn script(&self, steps: &[Step]) -> String {
        render_script(steps, &self.dbus)
    }

    pub async fn run(&self, steps: &[Step]) -> Result<(), CoreError> {
        let script = self.script(steps);
        debug!(steps = steps.len(), %script, "launching strategy script");

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CoreError::Process {
                program: self.shell.display().to_string(),
                source,
            })?;

        match tokio::time::timeout(self.ceiling, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "strategy script exited"),
            Ok(Err(e)) => warn!(error = %e, "lost track of strategy script"),
            Err(_) => warn!(
                ceiling_ms = self.ceiling.as_millis(),
                "strategy script still running; verifying anyway"
            ),
        }
        Ok(())
    }
}

/// Render a plan as a `sh` script. Lines are independent: a failing step
/// does not stop the ones after it.
pub fn render_script(steps: &[Step], dbus: &DbusSendCommand) -> String {
    let mut script = String::new();
    for step in steps {
        let line = match step {
            Step::SetProperty {
                path,
                interface,
                name,
                value,
            } => format!(
                "{} >/dev/null 2>&1",
                quote_all(&dbus.set_property(path, interface, name, *value))
            ),
            Step::Invoke {
                path,
                interface,
                method,
            } => format!(
                "{} >/dev/null 2>&1",
                quote_all(&dbus.invoke(path, interface, method))
            ),
            Step::Sleep(d) => format!("sleep {}", sleep_arg(*d)),
            Step::Kill { name } => format!("killall {} >/dev/null 2>&1", quote(name)),
            Step::SpawnDetached { command } => {
                format!("{} </dev/null >/dev/null 2>&1 &", quote_all(command))
            }
        };
        let _ = writeln!(script, "{line}");
    }
    script
}

fn sleep_arg(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.3}", d.as_secs_f64())
    }
}

fn quote_all(argv: &[String]) -> String {
    argv.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" ")
}

/// Single-quote `arg` unless it is made only of shell-safe characters.
fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if safe {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

// ── Inline runner ───────────────────────────────────────────────────

/// Interprets steps in process. Records every step it executes.
pub struct InlineRunner<T> {
    transport: Arc<T>,
    host_processes: bool,
    journal: Mutex<Vec<Step>>,
}

impl<T: RadioTransport> InlineRunner<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            host_processes: true,
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Record kill/spawn steps without touching host processes.
    pub fn without_host_processes(mut self) -> Self {
        self.host_processes = false;
        self
    }

    pub fn journal(&self) -> Vec<Step> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn run(&self, steps: &[Step]) {
        for step in steps {
            self.journal
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(step.clone());
            self.execute(step).await;
        }
    }

    async fn execute(&self, step: &Step) {
        match step {
            Step::SetProperty {
                path,
                interface,
                name,
                value,
            } => {
                if let Err(e) = self
                    .transport
                    .set_bool_property(path, interface, name, *value)
                    .await
                {
                    warn!(%path, name, error = %e, "set property step failed");
                }
            }
            Step::Invoke {
                path,
                interface,
                method,
            } => {
                if let Err(e) = self.transport.invoke_method(path, interface, method).await {
                    warn!(%path, method, error = %e, "invoke step failed");
                }
            }
            Step::Sleep(d) => tokio::time::sleep(*d).await,
            Step::Kill { name } if self.host_processes => {
                match Command::new("killall").arg(name).status().await {
                    Ok(status) => debug!(name, %status, "killall"),
                    Err(e) => warn!(name, error = %e, "killall failed"),
                }
            }
            Step::SpawnDetached { command } if self.host_processes => {
                let Some((program, args)) = command.split_first() else {
                    return;
                };
                match Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                {
                    Ok(_) => info!(program, "spawned"),
                    Err(e) => warn!(program, error = %e, "spawn failed"),
                }
            }
            Step::Kill { .. } | Step::SpawnDetached { .. } => {
                debug!(?step, "host process step skipped");
            }
        }
    }
}
