//! # Post-mortem trace file.
//!
//! Supervisors and runners report every decision through `tracing` with a
//! `process` field. [`init`] routes those events into a plain text file so an
//! operator can reconstruct what happened after the fact. Nothing reads the
//! file back.
//!
//! ## Example output
//! ```text
//! 2024-05-01T10:00:00.000Z  INFO overseer::core::supervisor: process starting process="zone0" restarts=0
//! 2024-05-01T10:00:03.120Z  INFO overseer::core::supervisor: marker matched process="zone0" marker="Entering sleep mode" state=Sleeping
//! 2024-05-01T10:04:12.001Z  INFO overseer::core::supervisor: process exited, restarting process="zone0" uptime=249.001s restarts=1 delay=10s last_error="none"
//! ```

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::error::RuntimeError;

/// Log file configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// File the trace is written to (truncated on start).
    pub path: PathBuf,
    /// Minimum level when `RUST_LOG` is not set.
    pub level: Level,
    /// Include the module path of each event.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("overseer.log"),
            level: Level::INFO,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Returns a config writing to `path` with default settings.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Set the log level.
    #[must_use]
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

/// Installs the global subscriber writing to the configured file.
///
/// Should be called once at startup. Respects `RUST_LOG` if set.
pub fn init(config: &LogConfig) -> Result<(), RuntimeError> {
    let file = File::create(&config.path).map_err(|e| RuntimeError::Logging {
        reason: format!("create {}: {e}", config.path.display()),
    })?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_ansi(false)
            .with_target(config.with_target)
            .with_writer(Mutex::new(file)),
    );

    tracing::subscriber::set_global_default(subscriber).map_err(|e| RuntimeError::Logging {
        reason: e.to_string(),
    })
}
