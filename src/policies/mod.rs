//! Respawn policies.
//!
//! This module groups the knobs that control **how long** a supervisor waits
//! between a process exit and its next spawn.
//!
//! ## Contents
//! - [`BackoffPolicy`] how respawn delays evolve (step / max / floor / stable run)
//!
//! ## Quick wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► core::supervisor::Supervisor uses:
//!           - backoff.next(prev_delay, uptime) on every exit
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → step=10s, max=60s, floor=10s, stable_after=3min.

mod backoff;

pub use backoff::BackoffPolicy;
