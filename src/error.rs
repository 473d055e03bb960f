//! Error types used by the overseer runtime and its process runners.
//!
//! This module defines three error enums:
//!
//! - [`RuntimeError`]: errors that reach the caller of the engine.
//! - [`SpawnError`]: pre-flight failures when registering a managed process.
//! - [`RunnerError`]: outcomes of a single OS process run.
//!
//! All types provide `as_label` for logs. Only [`RuntimeError`] ever escapes
//! the engine; [`RunnerError`] is folded into the restart path by the
//! supervisor.

use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

/// # Errors produced by the overseer runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A managed process could not be registered; its supervisor never started.
    #[error("manage {name}: {source}")]
    Spawn {
        /// Logical process name.
        name: String,
        /// Pre-flight failure.
        #[source]
        source: SpawnError,
    },

    /// A managed process with the same name is already registered.
    #[error("process {name} is already managed")]
    Duplicate {
        /// Logical process name.
        name: String,
    },

    /// Shutdown grace period was exceeded; some processes had not stopped.
    #[error("shutdown timeout {grace:?} exceeded; still running: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of processes whose state was not `Stopped`.
        stuck: Vec<String>,
    },

    /// The log file could not be created or the global subscriber was already set.
    #[error("logging: {reason}")]
    Logging {
        /// Underlying failure.
        reason: String,
    },

    /// OS signal listeners could not be installed.
    #[error("signal listener: {source}")]
    Signal {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use overseer::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Spawn { .. } => "runtime_spawn",
            RuntimeError::Duplicate { .. } => "runtime_duplicate",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Logging { .. } => "runtime_logging",
            RuntimeError::Signal { .. } => "runtime_signal",
        }
    }
}

/// # Pre-flight failures when registering a managed process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The executable does not exist or cannot be inspected.
    #[error("stat {path}: {source}")]
    Missing {
        /// Resolved executable path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The executable path points at a directory.
    #[error("{path} is a directory")]
    IsDirectory {
        /// Resolved executable path.
        path: PathBuf,
    },

    /// The working directory does not exist or is not a directory.
    #[error("working directory {path} is not a directory")]
    WorkingDir {
        /// Working directory path.
        path: PathBuf,
    },
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::Missing { .. } => "spawn_missing",
            SpawnError::IsDirectory { .. } => "spawn_is_directory",
            SpawnError::WorkingDir { .. } => "spawn_working_dir",
        }
    }
}

/// # Outcome of one OS process run that was not a clean exit.
///
/// Every variant except [`RunnerError::AlreadyRunning`] is reported to the
/// supervisor through the exit channel and treated as an ordinary exit.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunnerError {
    /// `start` was called while a previous instance is still active.
    #[error("process {name} already running")]
    AlreadyRunning {
        /// Logical process name.
        name: String,
    },

    /// The OS refused to start the process.
    #[error("start {name}: {source}")]
    Spawn {
        /// Logical process name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Standard output could not be attached.
    #[error("stdout pipe for {name} unavailable")]
    Pipe {
        /// Logical process name.
        name: String,
    },

    /// Waiting on the process failed.
    #[error("wait {name}: {source}")]
    Wait {
        /// Logical process name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The process exited unsuccessfully (non-zero code or killed by a signal).
    #[error("{name} exited with {status}")]
    Exited {
        /// Logical process name.
        name: String,
        /// Rendered exit status.
        status: String,
    },

    /// The interrupt could not be delivered.
    #[error("signal {name}: {reason}")]
    Signal {
        /// Logical process name.
        name: String,
        /// Underlying failure.
        reason: String,
    },
}

impl RunnerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use overseer::RunnerError;
    ///
    /// let err = RunnerError::Exited { name: "zone0".into(), status: "exit status: 1".into() };
    /// assert_eq!(err.as_label(), "runner_exited");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnerError::AlreadyRunning { .. } => "runner_already_running",
            RunnerError::Spawn { .. } => "runner_spawn",
            RunnerError::Pipe { .. } => "runner_pipe",
            RunnerError::Wait { .. } => "runner_wait",
            RunnerError::Exited { .. } => "runner_exited",
            RunnerError::Signal { .. } => "runner_signal",
        }
    }
}
