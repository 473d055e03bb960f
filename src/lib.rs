//! # overseer
//!
//! **Overseer** keeps the processes of a multi-process game-server cluster
//! alive: a world coordinator, any number of zone workers, a chat/mail relay
//! and configured extra executables, all on one host.
//!
//! Each managed process gets its own supervisor task that spawns the
//! executable, classifies its standard output, restarts it with backoff when
//! it exits and publishes its state to a shared registry that dashboards
//! read.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ProcessSpec  │   │ ProcessSpec  │   │ ProcessSpec  │
//!     │   (zone0)    │   │   (world)    │   │    (ucs)     │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Overseer                                                         │
//! │  - Registry (state / pid / start time per name)                   │
//! │  - Shutdown (cancellation token + active-task counter)            │
//! │  - Config (backoff, ready timeout, error threshold, ...)           │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Supervisor  │   │  Supervisor  │   │  Supervisor  │
//!     │ (state loop) │   │ (state loop) │   │ (state loop) │
//!     └┬─────────▲───┘   └┬─────────▲───┘   └┬─────────▲───┘
//!      │ start   │ lines  │         │        │         │
//!      │ stop    │ exit   │         │        │         │
//!     ┌▼─────────┴───┐   ┌▼─────────┴───┐   ┌▼─────────┴───┐
//!     │ProcessRunner │   │ProcessRunner │   │ProcessRunner │
//!     │ (OS process) │   │ (OS process) │   │ (OS process) │
//!     └──────────────┘   └──────────────┘   └──────────────┘
//!
//! Supervisors ── set_state / set_pid ──► Registry ──► Change queues ──► dashboards
//! ```
//!
//! ### Lifecycle
//! ```text
//! Starting ──ready marker / 10s silence──► Running ◄──"Zone booted successfully"── Sleeping
//!    │                                        │                                     ▲
//!    └──[Error]──► Erroring ◄──10 × [Error]───┘──────"Entering sleep mode" (zone)───┘
//!
//! any ──exit──► Restarting ──sleep(backoff)──► Starting
//! any ──shutdown──► Stopped (terminal)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                  |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Supervision**   | Register processes and fleets, global shutdown.              | [`Overseer`], [`Supervisor`]               |
//! | **Processes**     | Spawn, stream output, interrupt.                             | [`Runner`], [`ProcessRunner`]              |
//! | **Observation**   | Snapshots, zone aggregates, change notifications.            | [`Registry`], [`Snapshot`], [`Change`]     |
//! | **Classification**| Fixed marker tables per process kind.                        | [`ProcessKind`], [`classify`]              |
//! | **Policies**      | Respawn delay ladder.                                        | [`BackoffPolicy`]                          |
//! | **Errors**        | Typed errors for registration, runs and shutdown.            | [`RuntimeError`], [`RunnerError`]          |
//! | **Configuration** | Centralize runtime settings.                                 | [`Config`], [`LogConfig`]                  |
//!
//! ## Example
//! ```no_run
//! use overseer::{Config, LogConfig, Overseer, ProcessSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     overseer::logging::init(&LogConfig::at("overseer.log"))?;
//!
//!     let overseer = Overseer::new(Config::default());
//!     overseer.manage(ProcessSpec::new("world", "/srv/eqemu", "bin/world"))?;
//!     overseer.manage(ProcessSpec::new("zone0", "/srv/eqemu", "bin/zone"))?;
//!
//!     let registry = overseer.registry();
//!     let mut changes = registry.subscribe();
//!     tokio::spawn(async move {
//!         while let Some(change) = changes.recv().await {
//!             println!("{}: {:?}", change.name, change.kind);
//!         }
//!     });
//!
//!     overseer.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
mod classify;
mod config;
mod core;
mod error;
pub mod logging;
mod policies;
mod spec;
mod state;

// ---- Public re-exports ----

pub use classify::{Classification, ERROR_TAG, Marker, ProcessKind, classify};
pub use config::Config;
pub use core::{
    Change, ChangeKind, ExitReport, LineEvent, ManagedProcess, Overseer, ProcessRunner,
    ProcessStatus, Registry, RunOutcome, Runner, RunnerPipes, Shutdown, Snapshot, Supervisor,
    SupervisorPipes, ZoneSummary, format_uptime, is_zone, pipes, wait_for_shutdown_signal,
};
pub use error::{RunnerError, RuntimeError, SpawnError};
pub use logging::LogConfig;
pub use policies::BackoffPolicy;
pub use spec::{FleetSpec, ProcessSpec};
pub use state::AppState;
