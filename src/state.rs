//! # Lifecycle state of a managed process.
//!
//! [`AppState`] is what observers see for every managed process. Transitions
//! are driven exclusively by the owning [`Supervisor`](crate::core::Supervisor);
//! no ordering between variants is implied.

use std::fmt;

/// Operational state of a managed process as published to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AppState {
    /// No information yet.
    #[default]
    Unknown,
    /// Process spawned, readiness not yet observed.
    Starting,
    /// Process reported ready (or the fallback promotion fired).
    Running,
    /// Zone worker idling until a player arrives.
    Sleeping,
    /// Process emits `[Error]` lines (threshold reached, or during startup).
    Erroring,
    /// Process exited; waiting out the backoff delay before respawn.
    Restarting,
    /// Terminal: shutdown was observed and the supervisor is gone.
    Stopped,
}

impl AppState {
    /// Every variant, in declaration order.
    pub const ALL: [AppState; 7] = [
        AppState::Unknown,
        AppState::Starting,
        AppState::Running,
        AppState::Sleeping,
        AppState::Erroring,
        AppState::Restarting,
        AppState::Stopped,
    ];

    /// Returns the display name used by dashboards.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Unknown => "Unknown",
            AppState::Starting => "Starting",
            AppState::Running => "Running",
            AppState::Sleeping => "Sleeping",
            AppState::Erroring => "Erroring",
            AppState::Restarting => "Restarting",
            AppState::Stopped => "Stopped",
        }
    }

    /// True once the supervisor has permanently stopped.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppState::Stopped)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
