//! # Shutdown coordination and OS signal handling.
//!
//! [`Shutdown`] pairs the shared cancellation signal with an active-task
//! counter. Every supervisor loop is spawned through it; the host waits on
//! [`Shutdown::wait_all`] until every loop has reached `Stopped`.
//!
//! ```text
//! request() ──► token.cancel() ──► each Supervisor: Stopped → runner.stop() → exit
//!                                              │
//! wait_all() ◄── tracker empty ◄───────────────┘
//! ```
//!
//! [`wait_for_shutdown_signal`] completes when the host receives a
//! termination signal.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd)
//! - `SIGQUIT` (quit signal)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

use std::future::Future;

use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

/// Shared cancellation signal plus active-task counter.
///
/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Shutdown {
    /// Creates a coordinator with no tasks and no pending request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by supervisors.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests shutdown. Further calls are no-ops.
    pub fn request(&self) {
        if !self.token.is_cancelled() {
            info!(active = self.active(), "shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once shutdown has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await
    }

    /// Spawns a tracked task; the counter drops when it finishes.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(fut);
    }

    /// Number of tracked tasks still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every tracked task has finished.
    ///
    /// Closes the tracker so the wait can complete once it is empty. Tasks
    /// spawned afterwards are still tracked and counted by [`Shutdown::active`].
    pub async fn wait_all(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Ok(())` on Ctrl-C, or `Err` if the listener cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
