//! # Run a single OS process instance.
//!
//! A [`Runner`] owns at most one live child at a time. [`ProcessRunner`] is the
//! real implementation; the supervisor only talks to the trait, which keeps
//! the restart logic testable without spawning processes.
//!
//! - **Spawn** the executable with its working directory and arguments
//! - **Stream** standard output line by line to the supervisor
//! - **Wait** for exit and report the outcome **exactly once**
//! - **Stop** cooperatively (interrupt, not kill) on request
//!
//! ## Channels
//!
//! ```text
//!               RunnerPipes                         SupervisorPipes
//! line reader ── lines.send(line) ──► [cap 1] ──► lines.recv()   (Supervisor)
//! start()     ── done.send(outcome) ► [cap 1] ──► done.recv()
//! start()     ── pid watch ─────────────────────► watch_pid().changed()
//! ```
//!
//! Both queues hold a single item: a supervisor that is slow to classify
//! slows down how fast the child's stdout pipe is drained.
//!
//! ## Shutdown
//!
//! ```text
//! ctx cancelled ──► wait up to stop_grace for exit (supervisor sends the interrupt)
//!                      ├─ exited        → outcome reported, logged as shutdown exit
//!                      └─ grace elapsed → kill → outcome reported, logged as shutdown exit
//! ```
//!
//! ## Rules
//! - `start` fails with [`RunnerError::AlreadyRunning`] without touching the
//!   exit channel if an instance is active.
//! - Every other outcome (spawn failure included) goes through the exit channel.
//! - The last buffered lines are forwarded before the exit is reported.

use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    sync::{mpsc, watch},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::RunnerError, spec::ProcessSpec};

/// Result of one run as reported on the exit channel.
pub type RunOutcome = Result<(), RunnerError>;

/// How long the line reader may keep draining after the child exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Sending halves, owned by the runner.
pub struct RunnerPipes {
    /// Completed stdout lines.
    pub lines: mpsc::Sender<String>,
    /// One outcome per run.
    pub done: mpsc::Sender<RunOutcome>,
}

/// Receiving halves, owned by the supervisor.
pub struct SupervisorPipes {
    /// Completed stdout lines.
    pub lines: mpsc::Receiver<String>,
    /// One outcome per run.
    pub done: mpsc::Receiver<RunOutcome>,
}

/// Creates the private channel pair between one supervisor and its runner.
pub fn pipes() -> (RunnerPipes, SupervisorPipes) {
    let (lines_tx, lines_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = mpsc::channel(1);
    (
        RunnerPipes {
            lines: lines_tx,
            done: done_tx,
        },
        SupervisorPipes {
            lines: lines_rx,
            done: done_rx,
        },
    )
}

/// # Owner of one OS process instance at a time.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use overseer::{ProcessRunner, ProcessSpec, Runner, pipes};
///
/// # async fn demo() {
/// let (tx, mut rx) = pipes();
/// let spec = ProcessSpec::new("world", "/srv/eq", "bin/world");
/// let runner = Arc::new(ProcessRunner::new(spec, tx, std::time::Duration::from_secs(30)));
///
/// let r = Arc::clone(&runner);
/// tokio::spawn(async move { r.start(CancellationToken::new()).await });
///
/// while let Some(line) = rx.lines.recv().await {
///     println!("{line}");
/// }
/// # }
/// ```
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    /// Spawns the process and blocks until it exits.
    ///
    /// The outcome is sent on the exit channel exactly once. `ctx` is the
    /// surrounding shutdown signal: once cancelled the child gets a bounded
    /// time to exit before it is killed.
    ///
    /// Returns `Err` only if another instance is already active.
    async fn start(&self, ctx: CancellationToken) -> Result<(), RunnerError>;

    /// Sends a cooperative interrupt to the active process, if any.
    ///
    /// Returns immediately without waiting for the exit.
    fn stop(&self) -> Result<(), RunnerError>;

    /// Current OS process id (0 if none is active).
    fn pid(&self) -> u32;

    /// Receiver notified whenever [`Runner::pid`] changes.
    fn watch_pid(&self) -> watch::Receiver<u32>;
}

struct Active {
    pid: u32,
    #[cfg_attr(unix, allow(dead_code))]
    kill: CancellationToken,
}

/// [`Runner`] backed by a real child process.
pub struct ProcessRunner {
    spec: ProcessSpec,
    pipes: RunnerPipes,
    stop_grace: Duration,
    active: Mutex<Option<Active>>,
    pid: watch::Sender<u32>,
}

impl ProcessRunner {
    /// Creates a runner for `spec`.
    ///
    /// `stop_grace` bounds how long the child may take to exit once shutdown
    /// is observed.
    pub fn new(spec: ProcessSpec, pipes: RunnerPipes, stop_grace: Duration) -> Self {
        let (pid, _) = watch::channel(0);
        Self {
            spec,
            pipes,
            stop_grace,
            active: Mutex::new(None),
            pid,
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Active>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.spec.program());
        cmd.args(self.spec.args())
            .current_dir(self.spec.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // No console window for the child.
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }

    async fn run(&self, ctx: &CancellationToken, kill: &CancellationToken) -> RunOutcome {
        let name = self.spec.name();
        if ctx.is_cancelled() {
            debug!(process = name, "shutdown requested before spawn");
            return Ok(());
        }
        debug!(
            process = name,
            command = %self.spec.command_line(),
            dir = %self.spec.working_dir().display(),
            "spawning process"
        );

        let mut child = self.command().spawn().map_err(|source| RunnerError::Spawn {
            name: name.to_string(),
            source,
        })?;

        let pid = child.id().unwrap_or(0);
        if let Some(active) = self.lock_active().as_mut() {
            active.pid = pid;
        }
        self.pid.send_replace(pid);
        info!(process = name, pid, "process started");

        let Some(stdout) = child.stdout.take() else {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(RunnerError::Pipe {
                name: name.to_string(),
            });
        };
        let mut reader = tokio::spawn(forward_lines(stdout, self.pipes.lines.clone()));

        let status = tokio::select! {
            res = child.wait() => res,
            _ = kill.cancelled() => {
                let _ = child.start_kill();
                child.wait().await
            }
            _ = ctx.cancelled() => self.wait_after_shutdown(&mut child).await,
        };

        // Reaped: the pid may be reused from here on.
        if let Some(active) = self.lock_active().as_mut() {
            active.pid = 0;
        }
        self.pid.send_replace(0);

        if time::timeout(DRAIN_TIMEOUT, &mut reader).await.is_err() {
            debug!(process = name, "stdout still open after exit, detaching reader");
            reader.abort();
        }

        into_outcome(name, status)
    }

    /// Gives the child `stop_grace` to honour the interrupt, then kills it.
    async fn wait_after_shutdown(&self, child: &mut Child) -> std::io::Result<ExitStatus> {
        match time::timeout(self.stop_grace, child.wait()).await {
            Ok(res) => res,
            Err(_elapsed) => {
                info!(
                    process = self.spec.name(),
                    grace = ?self.stop_grace,
                    "process ignored interrupt, killing"
                );
                let _ = child.start_kill();
                child.wait().await
            }
        }
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn start(&self, ctx: CancellationToken) -> Result<(), RunnerError> {
        let kill = CancellationToken::new();
        {
            let mut active = self.lock_active();
            if active.is_some() {
                warn!(process = self.spec.name(), "process already running");
                return Err(RunnerError::AlreadyRunning {
                    name: self.spec.name().to_string(),
                });
            }
            *active = Some(Active {
                pid: 0,
                kill: kill.clone(),
            });
        }

        let outcome = self.run(&ctx, &kill).await;

        *self.lock_active() = None;
        self.pid.send_if_modified(|pid| std::mem::replace(pid, 0) != 0);

        let name = self.spec.name();
        match &outcome {
            _ if ctx.is_cancelled() => {
                debug!(process = name, outcome = ?outcome, "process exited on shutdown signal");
            }
            Ok(()) => info!(process = name, "process exited by itself"),
            Err(e) => info!(process = name, error = %e, label = e.as_label(), "process finished with error"),
        }

        let _ = self.pipes.done.send(outcome).await;
        Ok(())
    }

    fn stop(&self) -> Result<(), RunnerError> {
        let active = self.lock_active();
        let Some(active) = active.as_ref() else {
            return Ok(());
        };
        if active.pid == 0 {
            return Ok(());
        }

        info!(process = self.spec.name(), pid = active.pid, "stopping process");
        interrupt(self.spec.name(), active)
    }

    fn pid(&self) -> u32 {
        *self.pid.borrow()
    }

    fn watch_pid(&self) -> watch::Receiver<u32> {
        self.pid.subscribe()
    }
}

#[cfg(unix)]
fn interrupt(name: &str, active: &Active) -> Result<(), RunnerError> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    signal::kill(Pid::from_raw(active.pid as i32), Signal::SIGINT).map_err(|e| {
        RunnerError::Signal {
            name: name.to_string(),
            reason: e.to_string(),
        }
    })
}

// No console to deliver Ctrl-C to; fall back to terminating the child.
#[cfg(not(unix))]
fn interrupt(_name: &str, active: &Active) -> Result<(), RunnerError> {
    active.kill.cancel();
    Ok(())
}

fn into_outcome(name: &str, status: std::io::Result<ExitStatus>) -> RunOutcome {
    match status {
        Ok(s) if s.success() => Ok(()),
        Ok(s) => Err(RunnerError::Exited {
            name: name.to_string(),
            status: s.to_string(),
        }),
        Err(source) => Err(RunnerError::Wait {
            name: name.to_string(),
            source,
        }),
    }
}

/// Forwards stdout lines until EOF, a read error, or the supervisor going away.
///
/// Invalid UTF-8 is replaced rather than ending the stream.
async fn forward_lines(stdout: ChildStdout, tx: mpsc::Sender<String>) {
    let mut segments = BufReader::new(stdout).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(mut raw)) => {
                if raw.last() == Some(&b'\r') {
                    raw.pop();
                }
                let line = String::from_utf8_lossy(&raw).into_owned();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "stdout read failed");
                break;
            }
        }
    }
}
