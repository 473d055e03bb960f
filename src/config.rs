//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervision engine.
//!
//! Config is handed to [`Overseer::new`](crate::Overseer::new) once and shared
//! (cloned) into every supervisor and runner it starts. Loading it from a file
//! is the caller's business.
//!
//! ## Sentinel values
//! - `notify_capacity = 0` → clamped to 1
//! - `grace = None` → [`Overseer::shutdown`](crate::Overseer::shutdown) waits without bound

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the supervision engine.
///
/// ## Field semantics
/// - `backoff`: respawn delay ladder
/// - `ready_timeout`: fallback `Starting → Running` promotion window (also the idle tick)
/// - `error_threshold`: `[Error]` lines needed to enter `Erroring` once running
/// - `error_cooldown`: how far ahead the cooldown marker is armed
/// - `stop_grace`: wait for a cooperative exit during shutdown before killing
/// - `notify_capacity`: per-subscriber change-notification queue size
/// - `grace`: optional bound on the whole shutdown
#[derive(Clone, Debug)]
pub struct Config {
    /// Respawn delay policy.
    pub backoff: BackoffPolicy,

    /// Time after spawn at which a still-`Starting` process is promoted to `Running`.
    ///
    /// The supervisor also wakes at this interval when the child is silent.
    pub ready_timeout: Duration,

    /// Number of `[Error]` lines (per run) that forces `Erroring`.
    ///
    /// A single error line while `Starting` forces it regardless.
    pub error_threshold: u32,

    /// Distance of the cooldown timestamp armed on errors and restarts.
    pub error_cooldown: Duration,

    /// Time a runner gives its child to honour the interrupt once shutdown is observed.
    ///
    /// When it elapses the child is killed.
    pub stop_grace: Duration,

    /// Capacity of each change-notification queue.
    ///
    /// A full queue blocks registry writers until the observer catches up.
    pub notify_capacity: usize,

    /// Optional bound on the total shutdown wait.
    pub grace: Option<Duration>,
}

impl Config {
    /// Returns a notification capacity clamped to a minimum of 1.
    #[inline]
    pub fn notify_capacity_clamped(&self) -> usize {
        self.notify_capacity.max(1)
    }

    /// Returns the error threshold clamped to a minimum of 1.
    #[inline]
    pub fn error_threshold_clamped(&self) -> u32 {
        self.error_threshold.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `backoff = BackoffPolicy::default()` (10s steps up to 60s, wrap to 10s)
    /// - `ready_timeout = 10s`
    /// - `error_threshold = 10`
    /// - `error_cooldown = 30min`
    /// - `stop_grace = 30s`
    /// - `notify_capacity = 1000`
    /// - `grace = None` (wait for every child)
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            ready_timeout: Duration::from_secs(10),
            error_threshold: 10,
            error_cooldown: Duration::from_secs(30 * 60),
            stop_grace: Duration::from_secs(30),
            notify_capacity: 1000,
            grace: None,
        }
    }
}
