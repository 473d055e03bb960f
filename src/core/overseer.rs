//! # Overseer: fleet-level entry point.
//!
//! The [`Overseer`] owns the registry, the shutdown coordinator and the
//! runtime configuration. It validates each managed process, starts one
//! [`Supervisor`] per process and coordinates the final shutdown.
//!
//! ## Architecture
//! ```text
//! ProcessSpec ──► manage(): validate ──► pipes() ──► ProcessRunner
//!                                    └─► Supervisor::new(spec, runner, pipes, registry, cfg)
//!                                          └─► shutdown.spawn(sup.run(token))   (tracked)
//!
//! Observers ──► registry().snapshot() / registry().subscribe()
//!
//! Shutdown path:
//!   run_until_signal(): wait_for_shutdown_signal()
//!             └─► shutdown():
//!                    ├─ request()        → token cancelled, every supervisor stops its child
//!                    └─ wait_all()       → returns once every supervisor reached Stopped
//!                       (bounded by cfg.grace → GraceExceeded with the stuck names)
//! ```
//!
//! ## Example
//! ```no_run
//! use overseer::{Config, FleetSpec, Overseer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let overseer = Overseer::new(Config::default());
//!     let fleet = FleetSpec::new("/srv/eqemu", "bin").with_zone_count(4);
//!
//!     overseer.launch_fleet(&fleet)?;
//!     overseer.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    config::Config,
    core::{
        registry::Registry,
        runner::{ProcessRunner, Runner, RunnerPipes, pipes},
        shutdown::{Shutdown, wait_for_shutdown_signal},
        supervisor::Supervisor,
    },
    error::RuntimeError,
    spec::{FleetSpec, ProcessSpec},
};

/// Starts supervisors and coordinates their shutdown.
///
/// Every method that launches or stops work must be called from inside a
/// Tokio runtime.
pub struct Overseer {
    cfg: Config,
    registry: Arc<Registry>,
    shutdown: Shutdown,
    names: Mutex<HashSet<String>>,
}

impl Overseer {
    /// Creates an overseer with an empty registry.
    pub fn new(cfg: Config) -> Self {
        let registry = Registry::new(cfg.notify_capacity_clamped());
        Self {
            cfg,
            registry,
            shutdown: Shutdown::new(),
            names: Mutex::new(HashSet::new()),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Shared registry, for observers.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Shutdown coordinator shared with every supervisor.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Registers `spec` and starts its supervisor.
    ///
    /// Fails without starting anything if the executable or working directory
    /// is invalid, or if the name is already managed. Everything that goes
    /// wrong after this returns is handled by the restart loop.
    pub fn manage(&self, spec: ProcessSpec) -> Result<(), RuntimeError> {
        if let Err(source) = spec.validate() {
            warn!(process = spec.name(), error = %source, label = source.as_label(), "cannot manage process");
            return Err(RuntimeError::Spawn {
                name: spec.name().to_string(),
                source,
            });
        }

        let stop_grace = self.cfg.stop_grace;
        self.manage_with(spec, move |spec, tx| {
            Arc::new(ProcessRunner::new(spec, tx, stop_grace))
        })
    }

    /// Registers `spec` with a caller-built [`Runner`], skipping the executable check.
    ///
    /// `make` receives the spec and the runner half of the private channels.
    pub fn manage_with<F>(&self, spec: ProcessSpec, make: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(ProcessSpec, RunnerPipes) -> Arc<dyn Runner>,
    {
        {
            let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
            if !names.insert(spec.name().to_string()) {
                return Err(RuntimeError::Duplicate {
                    name: spec.name().to_string(),
                });
            }
        }

        info!(
            process = spec.name(),
            kind = spec.kind().as_str(),
            command = %spec.command_line(),
            "managing process"
        );

        let (tx, rx) = pipes();
        let runner = make(spec.clone(), tx);
        let sup = Supervisor::new(
            spec,
            runner,
            rx,
            Arc::clone(&self.registry),
            self.cfg.clone(),
        );
        self.shutdown.spawn(sup.run(self.shutdown.token()));
        Ok(())
    }

    /// Registers every process of `fleet` in launch order.
    ///
    /// Stops at the first failure; processes registered before it keep running.
    pub fn launch_fleet(&self, fleet: &FleetSpec) -> Result<(), RuntimeError> {
        for spec in fleet.specs() {
            self.manage(spec)?;
        }
        Ok(())
    }

    /// Number of supervisors that have not finished yet.
    pub fn active(&self) -> usize {
        self.shutdown.active()
    }

    /// Requests shutdown and waits for every supervisor to stop.
    ///
    /// Bounded by [`Config::grace`] when set.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        match self.cfg.grace {
            Some(grace) => self.shutdown_with_grace(grace).await,
            None => {
                self.shutdown.request();
                self.shutdown.wait_all().await;
                info!("all processes stopped");
                Ok(())
            }
        }
    }

    /// Like [`Overseer::shutdown`] but gives up after `grace`.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] naming the processes that had
    /// not stopped in time.
    pub async fn shutdown_with_grace(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.shutdown.request();

        match tokio::time::timeout(grace, self.shutdown.wait_all()).await {
            Ok(()) => {
                info!("all processes stopped within grace");
                Ok(())
            }
            Err(_) => {
                let stuck = self.registry.not_stopped().await;
                warn!(?grace, ?stuck, "shutdown grace exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Waits for a termination signal, then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        tokio::select! {
            res = wait_for_shutdown_signal() => {
                res.map_err(|source| RuntimeError::Signal { source })?;
                info!("termination signal received");
            }
            _ = self.shutdown.requested() => {}
        }
        self.shutdown().await
    }
}
