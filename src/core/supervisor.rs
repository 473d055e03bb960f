//! # Supervisor: keeps one managed process alive.
//!
//! One [`Supervisor`] runs per managed process as an independent task. It
//! drives its [`Runner`] through spawn, observe, classify, back off and
//! respawn, and it is the only writer of the registry entry bearing its name.
//!
//! ## Loop
//! ```text
//! loop {
//!   ├─► cancelled? ─────────────────────────────► stop phase
//!   ├─► Starting, spawn runner.start(token)
//!   ├─► observe (earliest of):
//!   │     ├─ shutdown token                  → stop phase
//!   │     ├─ output line  → classify         → Erroring / marker state / fallback
//!   │     ├─ pid change                      → registry.set_pid
//!   │     ├─ idle tick (ready_timeout)       → Starting → Running fallback
//!   │     └─ exit reported
//!   ├─► exit during shutdown? ──────────────────► stop phase
//!   ├─► restart_count += 1, delay = backoff.next(delay, uptime)
//!   ├─► Restarting, pid 0
//!   └─► sleep(delay) (cancellable)
//! }
//! stop phase: Stopped → runner.stop() → drain lines until exit → pid 0
//! ```
//!
//! ## Rules
//! - Every spawn enters `Starting`; `Stopped` is terminal.
//! - Output lines are consumed before the exit report, so the last lines a
//!   child printed are still classified.
//! - Classified errors never restart or kill the child.
//! - Exits observed after shutdown was requested do not count as restarts.

use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    classify::{Classification, classify},
    config::Config,
    core::{
        registry::Registry,
        runner::{RunOutcome, Runner, SupervisorPipes},
    },
    error::RunnerError,
    spec::ProcessSpec,
    state::AppState,
};

/// Bookkeeping for one managed process, owned by its supervisor.
///
/// Pure state machine: every method takes the current instant, which keeps
/// transitions testable without a runtime.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    spec: ProcessSpec,
    state: AppState,
    restart_count: u64,
    last_error: Option<String>,
    last_error_at: Option<Instant>,
    error_count: u32,
    error_cooldown_until: Option<Instant>,
    delay: Duration,
    last_start: Option<Instant>,
}

/// Effect of one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// Error tag seen; `escalated` if the process entered `Erroring`.
    Error {
        /// Whether the state moved to `Erroring`.
        escalated: bool,
    },
    /// A marker moved the state.
    Transition {
        /// Matched marker.
        needle: &'static str,
        /// New state.
        to: AppState,
    },
    /// Silence-based promotion to `Running` happened on this line.
    Promoted,
    /// No effect.
    Plain,
}

/// What an exit did to the bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// How long the run lasted.
    pub uptime: Duration,
    /// Delay before the next spawn.
    pub delay: Duration,
    /// Exits so far, this one included.
    pub restart_count: u64,
    /// Last error line seen, if any.
    pub last_error: Option<String>,
}

impl ManagedProcess {
    /// Fresh record in `Unknown`.
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            state: AppState::Unknown,
            restart_count: 0,
            last_error: None,
            last_error_at: None,
            error_count: 0,
            error_cooldown_until: None,
            delay: Duration::ZERO,
            last_start: None,
        }
    }

    /// Process specification.
    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Current state.
    pub fn state(&self) -> AppState {
        self.state
    }

    /// Exits seen over the program lifetime.
    pub fn restart_count(&self) -> u64 {
        self.restart_count
    }

    /// Error lines seen since the last spawn.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Last error line seen.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When the last error line was seen.
    pub fn last_error_at(&self) -> Option<Instant> {
        self.last_error_at
    }

    /// Cooldown marker. Recorded for observers; nothing gates on it.
    pub fn error_cooldown_until(&self) -> Option<Instant> {
        self.error_cooldown_until
    }

    /// Delay applied before the latest respawn.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// When the current run was spawned.
    pub fn last_start(&self) -> Option<Instant> {
        self.last_start
    }

    /// Marks a new spawn.
    pub fn begin_run(&mut self, now: Instant) {
        self.state = AppState::Starting;
        self.last_start = Some(now);
    }

    /// Applies one output line.
    pub fn on_line(&mut self, line: &str, now: Instant, cfg: &Config) -> LineEvent {
        match classify(self.spec.kind(), self.state, line) {
            Classification::Error => {
                self.last_error = Some(line.to_string());
                self.last_error_at = Some(now);
                self.error_count = self.error_count.saturating_add(1);

                let escalated = self.error_count >= cfg.error_threshold_clamped()
                    || self.state == AppState::Starting;
                if escalated {
                    self.state = AppState::Erroring;
                    self.error_cooldown_until = Some(now + cfg.error_cooldown);
                }
                LineEvent::Error { escalated }
            }
            Classification::Transition { needle, to } if to != self.state => {
                self.state = to;
                LineEvent::Transition { needle, to }
            }
            Classification::Transition { .. } => LineEvent::Plain,
            Classification::Plain => match self.on_ready_timeout(now, cfg.ready_timeout) {
                Some(_) => LineEvent::Promoted,
                None => LineEvent::Plain,
            },
        }
    }

    /// Promotes a silent `Starting` process once `ready_timeout` has passed.
    pub fn on_ready_timeout(&mut self, now: Instant, ready_timeout: Duration) -> Option<AppState> {
        if self.state != AppState::Starting {
            return None;
        }
        let started = self.last_start?;
        if now.saturating_duration_since(started) >= ready_timeout {
            self.state = AppState::Running;
            return Some(AppState::Running);
        }
        None
    }

    /// When the idle tick should fire next.
    pub fn idle_deadline(&self, now: Instant, ready_timeout: Duration) -> Instant {
        match (self.state, self.last_start) {
            (AppState::Starting, Some(started)) => started + ready_timeout,
            _ => now + ready_timeout,
        }
    }

    /// Accounts for an exit and computes the respawn delay.
    pub fn on_exit(&mut self, now: Instant, cfg: &Config) -> ExitReport {
        let uptime = self
            .last_start
            .map_or(Duration::ZERO, |s| now.saturating_duration_since(s));

        self.restart_count += 1;
        self.delay = cfg.backoff.next(self.delay, uptime);
        self.state = AppState::Restarting;
        self.error_cooldown_until = Some(now + cfg.error_cooldown);
        self.error_count = 0;

        ExitReport {
            uptime,
            delay: self.delay,
            restart_count: self.restart_count,
            last_error: self.last_error.clone(),
        }
    }

    /// Enters the terminal state.
    pub fn stop(&mut self) {
        self.state = AppState::Stopped;
    }
}

enum Wake {
    Exited(RunOutcome),
    Cancelled,
}

/// Actor supervising one managed process.
pub struct Supervisor {
    process: ManagedProcess,
    runner: Arc<dyn Runner>,
    pipes: SupervisorPipes,
    pid_rx: watch::Receiver<u32>,
    registry: Arc<Registry>,
    cfg: Config,
}

impl Supervisor {
    /// Creates a supervisor around `runner`; `pipes` must be the runner's counterpart.
    pub fn new(
        spec: ProcessSpec,
        runner: Arc<dyn Runner>,
        pipes: SupervisorPipes,
        registry: Arc<Registry>,
        cfg: Config,
    ) -> Self {
        let pid_rx = runner.watch_pid();
        Self {
            process: ManagedProcess::new(spec),
            runner,
            pipes,
            pid_rx,
            registry,
            cfg,
        }
    }

    fn name(&self) -> &str {
        self.process.spec().name()
    }

    /// Runs until `token` is cancelled and the child has exited.
    pub async fn run(mut self, token: CancellationToken) {
        let mut pending = None;

        loop {
            if token.is_cancelled() {
                break;
            }

            let mut run = Some(self.spawn(&token).await);
            match self.observe(&mut run, &token).await {
                Wake::Cancelled => {
                    pending = run;
                    break;
                }
                Wake::Exited(outcome) => {
                    if token.is_cancelled() {
                        debug!(process = self.name(), outcome = ?outcome, "exit during shutdown");
                        break;
                    }
                    let delay = self.exited(outcome).await;

                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = token.cancelled() => break,
                    }
                }
            }
        }

        self.finish(pending).await;
    }

    async fn spawn(&mut self, token: &CancellationToken) -> JoinHandle<Result<(), RunnerError>> {
        self.process.begin_run(Instant::now());
        info!(
            process = self.name(),
            restarts = self.process.restart_count(),
            "process starting"
        );
        self.registry
            .set_state(self.process.spec().name(), AppState::Starting)
            .await;

        let runner = Arc::clone(&self.runner);
        let ctx = token.clone();
        tokio::spawn(async move { runner.start(ctx).await })
    }

    async fn observe(
        &mut self,
        run: &mut Option<JoinHandle<Result<(), RunnerError>>>,
        token: &CancellationToken,
    ) -> Wake {
        let mut pid_open = true;
        let mut done_open = true;

        loop {
            let deadline = self
                .process
                .idle_deadline(Instant::now(), self.cfg.ready_timeout);

            tokio::select! {
                biased;

                _ = token.cancelled() => return Wake::Cancelled,
                Some(line) = self.pipes.lines.recv() => self.line(line).await,
                outcome = self.pipes.done.recv(), if done_open => match outcome {
                    Some(outcome) => return Wake::Exited(outcome),
                    None => done_open = false,
                },
                ended = join_run(run, self.process.spec().name()) => {
                    // A report sent just before the task ended still wins.
                    let reported = self.pipes.done.try_recv().ok();
                    return Wake::Exited(reported.unwrap_or(ended));
                }
                changed = self.pid_rx.changed(), if pid_open => match changed {
                    Ok(()) => {
                        let pid = *self.pid_rx.borrow_and_update();
                        self.registry.set_pid(self.process.spec().name(), pid).await;
                    }
                    Err(_) => pid_open = false,
                },
                _ = time::sleep_until(deadline) => self.idle().await,
            }
        }
    }

    async fn line(&mut self, line: String) {
        let name = self.process.spec().name_arc();
        let name = &*name;
        debug!(process = name, line = %line, "output");

        match self.process.on_line(&line, Instant::now(), &self.cfg) {
            LineEvent::Error { escalated } => {
                warn!(
                    process = name,
                    errors = self.process.error_count(),
                    line = %line,
                    "error reported"
                );
                if escalated {
                    info!(process = name, "process erroring");
                    self.registry.set_state(name, AppState::Erroring).await;
                }
            }
            LineEvent::Transition { needle, to } => {
                info!(process = name, marker = needle, state = %to, "marker matched");
                self.registry.set_state(name, to).await;
            }
            LineEvent::Promoted => self.promoted().await,
            LineEvent::Plain => {}
        }
    }

    async fn idle(&mut self) {
        if self
            .process
            .on_ready_timeout(Instant::now(), self.cfg.ready_timeout)
            .is_some()
        {
            self.promoted().await;
        }
    }

    async fn promoted(&self) {
        info!(
            process = self.name(),
            after = ?self.cfg.ready_timeout,
            "no ready marker, assuming running"
        );
        self.registry
            .set_state(self.process.spec().name(), AppState::Running)
            .await;
    }

    async fn exited(&mut self, outcome: RunOutcome) -> Duration {
        let report = self.process.on_exit(Instant::now(), &self.cfg);
        let name = self.process.spec().name();

        match &outcome {
            Ok(()) => debug!(process = name, "clean exit"),
            Err(e) => debug!(process = name, error = %e, label = e.as_label(), "run failed"),
        }
        info!(
            process = name,
            uptime = ?report.uptime,
            restarts = report.restart_count,
            delay = ?report.delay,
            last_error = report.last_error.as_deref().unwrap_or("none"),
            "process exited, restarting"
        );

        self.registry.set_state(name, AppState::Restarting).await;
        self.registry.set_pid(name, 0).await;
        report.delay
    }

    /// Terminal phase: publish `Stopped`, interrupt the child and wait for it.
    async fn finish(mut self, mut run: Option<JoinHandle<Result<(), RunnerError>>>) {
        self.process.stop();
        let name = self.process.spec().name();
        self.registry.set_state(name, AppState::Stopped).await;

        if run.is_some() {
            if let Err(e) = self.runner.stop() {
                warn!(process = name, error = %e, "interrupt failed");
            }

            let mut done_open = true;
            loop {
                tokio::select! {
                    biased;

                    Some(line) = self.pipes.lines.recv() => {
                        debug!(process = name, line = %line, "output during shutdown");
                    }
                    done = self.pipes.done.recv(), if done_open => match done {
                        Some(_) => break,
                        None => done_open = false,
                    },
                    _ = join_run(&mut run, name) => break,
                }
            }
        }

        self.registry.set_pid(name, 0).await;
        info!(process = name, restarts = self.process.restart_count(), "process stopped");
    }
}

/// Resolves with the run's result when the runner task ends.
///
/// Pending forever once the handle has been consumed.
async fn join_run(
    run: &mut Option<JoinHandle<Result<(), RunnerError>>>,
    name: &str,
) -> RunOutcome {
    let Some(handle) = run.as_mut() else {
        return std::future::pending().await;
    };
    let joined = handle.await;
    *run = None;

    joined.unwrap_or_else(|e| {
        Err(RunnerError::Wait {
            name: name.to_string(),
            source: std::io::Error::other(e.to_string()),
        })
    })
}
