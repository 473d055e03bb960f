//! Runtime core: supervision and lifecycle.
//!
//! The entry point is [`Overseer`], which starts one supervisor per managed
//! process and coordinates the fleet shutdown.
//!
//! Internal modules:
//! - [`overseer`]: registers processes, launches fleets, drives shutdown;
//! - [`supervisor`]: per-process state machine and restart loop;
//! - [`runner`]: owns one OS process instance and streams its output;
//! - [`registry`]: shared state table and change notifications;
//! - [`shutdown`]: cancellation signal, active-task counter, OS signals.

mod overseer;
mod registry;
mod runner;
mod shutdown;
mod supervisor;

#[cfg(test)]
mod testing;

pub use overseer::Overseer;
pub use registry::{
    Change, ChangeKind, ProcessStatus, Registry, Snapshot, ZoneSummary, format_uptime, is_zone,
};
pub use runner::{ProcessRunner, RunOutcome, Runner, RunnerPipes, SupervisorPipes, pipes};
pub use shutdown::{Shutdown, wait_for_shutdown_signal};
pub use supervisor::{ExitReport, LineEvent, ManagedProcess, Supervisor};
