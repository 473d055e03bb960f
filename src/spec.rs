//! # Managed process specifications.
//!
//! Defines [`ProcessSpec`], the description of one managed executable, and
//! [`FleetSpec`], which expands a cluster layout into the ordered list of
//! specs the overseer launches (zones, world, relay, extras).
//!
//! A spec can be created:
//! - **Explicitly** with [`ProcessSpec::new`] (kind detected from the executable)
//! - **From a fleet layout** with [`FleetSpec::specs`]
//!
//! ## Rules
//! - Relative executable paths are resolved against the working directory.
//! - Names are unique per overseer; the registry keys on them.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{classify::ProcessKind, error::SpawnError};

/// Specification for one managed process.
///
/// ## Example
/// ```rust
/// use overseer::{ProcessKind, ProcessSpec};
///
/// let spec = ProcessSpec::new("zone3", "/srv/eqemu", "bin/zone").with_args(["--verbose"]);
/// assert_eq!(spec.kind(), ProcessKind::Zone);
/// assert!(spec.program().ends_with("bin/zone"));
/// ```
#[derive(Clone)]
pub struct ProcessSpec {
    name: Arc<str>,
    working_dir: PathBuf,
    program: PathBuf,
    args: Vec<String>,
    kind: ProcessKind,
}

impl ProcessSpec {
    /// Creates a spec; the kind is derived from the executable's file stem.
    ///
    /// ### Parameters
    /// - `name`: logical name (registry key)
    /// - `working_dir`: directory the process runs in
    /// - `program`: executable path, absolute or relative to `working_dir`
    pub fn new(
        name: impl Into<Arc<str>>,
        working_dir: impl Into<PathBuf>,
        program: impl AsRef<Path>,
    ) -> Self {
        let working_dir = working_dir.into();
        let program = resolve(&working_dir, program.as_ref());
        Self {
            name: name.into(),
            kind: ProcessKind::detect(&program),
            working_dir,
            program,
            args: Vec::new(),
        }
    }

    /// Returns a new spec with the given arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a new spec with an explicit kind instead of the detected one.
    pub fn with_kind(mut self, kind: ProcessKind) -> Self {
        self.kind = kind;
        self
    }

    /// Logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the logical name.
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolved executable path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Process kind (selects readiness markers).
    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Checks that the working directory and executable exist.
    ///
    /// This is the only failure that escapes registration; anything that goes
    /// wrong later is handled by the restart loop.
    pub fn validate(&self) -> Result<(), SpawnError> {
        if !self.working_dir.is_dir() {
            return Err(SpawnError::WorkingDir {
                path: self.working_dir.clone(),
            });
        }

        let meta = std::fs::metadata(&self.program).map_err(|source| SpawnError::Missing {
            path: self.program.clone(),
            source,
        })?;
        if meta.is_dir() {
            return Err(SpawnError::IsDirectory {
                path: self.program.clone(),
            });
        }
        Ok(())
    }

    /// Command line rendered for logs.
    pub fn command_line(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

impl fmt::Debug for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("working_dir", &self.working_dir)
            .field("program", &self.program)
            .field("args", &self.args)
            .finish()
    }
}

fn resolve(working_dir: &Path, program: &Path) -> PathBuf {
    if program.is_absolute() {
        program.to_path_buf()
    } else {
        working_dir.join(program)
    }
}

/// Layout of a whole cluster on disk.
///
/// Expands into `zone0..zoneN-1`, `world`, `ucs` and one spec per extra app,
/// all running in `server_dir` with executables taken from `bin_dir`.
///
/// ## Example
/// ```rust
/// use overseer::FleetSpec;
///
/// let fleet = FleetSpec::new("/srv/eqemu", "/srv/eqemu/bin")
///     .with_zone_count(2)
///     .with_apps(["queryserv"]);
///
/// let names: Vec<String> = fleet.specs().iter().map(|s| s.name().to_string()).collect();
/// assert_eq!(names, ["zone0", "zone1", "world", "ucs", "queryserv"]);
/// ```
#[derive(Clone, Debug)]
pub struct FleetSpec {
    /// Working directory of every process.
    pub server_dir: PathBuf,
    /// Directory holding the executables (absolute or relative to `server_dir`).
    pub bin_dir: PathBuf,
    /// Number of zone workers.
    pub zone_count: usize,
    /// Extra executables, by file name inside `bin_dir`.
    pub apps: Vec<String>,
}

impl FleetSpec {
    /// Creates a layout with no zones and no extras.
    pub fn new(server_dir: impl Into<PathBuf>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_dir: server_dir.into(),
            bin_dir: bin_dir.into(),
            zone_count: 0,
            apps: Vec::new(),
        }
    }

    /// Returns a new layout with `n` zone workers.
    pub fn with_zone_count(mut self, n: usize) -> Self {
        self.zone_count = n;
        self
    }

    /// Returns a new layout with the given extra executables.
    pub fn with_apps<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apps = apps.into_iter().map(Into::into).collect();
        self
    }

    /// Expands the layout into specs, in launch order.
    pub fn specs(&self) -> Vec<ProcessSpec> {
        let bin = resolve(&self.server_dir, &self.bin_dir);
        let exe = |stem: &str| bin.join(format!("{stem}{}", std::env::consts::EXE_SUFFIX));

        let mut out = Vec::with_capacity(self.zone_count + 2 + self.apps.len());
        for i in 0..self.zone_count {
            out.push(ProcessSpec::new(format!("zone{i}"), &self.server_dir, exe("zone")));
        }
        out.push(ProcessSpec::new("world", &self.server_dir, exe("world")));
        out.push(ProcessSpec::new("ucs", &self.server_dir, exe("ucs")));

        for app in &self.apps {
            let path = bin.join(app);
            let name = Path::new(app)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| app.clone());
            out.push(ProcessSpec::new(name, &self.server_dir, path));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_program_resolves_against_working_dir() {
        let spec = ProcessSpec::new("world", "/srv/eq", "bin/world");
        assert_eq!(spec.program(), Path::new("/srv/eq/bin/world"));
        assert_eq!(spec.kind(), ProcessKind::World);
    }

    #[test]
    fn test_absolute_program_kept() {
        let spec = ProcessSpec::new("ucs", "/srv/eq", "/opt/eq/ucs");
        assert_eq!(spec.program(), Path::new("/opt/eq/ucs"));
        assert_eq!(spec.kind(), ProcessKind::Relay);
    }

    #[test]
    fn test_kind_override() {
        let spec = ProcessSpec::new("w", "/srv", "/bin/sh").with_kind(ProcessKind::World);
        assert_eq!(spec.kind(), ProcessKind::World);
    }

    #[test]
    fn test_command_line() {
        let spec = ProcessSpec::new("z", "/srv", "/srv/zone").with_args(["-a", "b"]);
        assert_eq!(spec.command_line(), "/srv/zone -a b");
    }

    #[test]
    fn test_validate_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec::new("zone0", dir.path(), "zone");
        let err = spec.validate().unwrap_err();
        assert_eq!(err.as_label(), "spawn_missing");
    }

    #[test]
    fn test_validate_directory_executable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zone")).unwrap();
        let spec = ProcessSpec::new("zone0", dir.path(), "zone");
        let err = spec.validate().unwrap_err();
        assert_eq!(err.as_label(), "spawn_is_directory");
    }

    #[test]
    fn test_validate_bad_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let spec = ProcessSpec::new("zone0", &missing, "/bin/sh");
        let err = spec.validate().unwrap_err();
        assert_eq!(err.as_label(), "spawn_working_dir");
    }

    #[test]
    fn test_validate_ok() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("world"), b"").unwrap();
        let spec = ProcessSpec::new("world", dir.path(), "world");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_fleet_order_and_kinds() {
        let fleet = FleetSpec::new("/srv/eq", "bin")
            .with_zone_count(3)
            .with_apps(["queryserv", "loginserver.bin"]);
        let specs = fleet.specs();

        let names: Vec<&str> = specs.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["zone0", "zone1", "zone2", "world", "ucs", "queryserv", "loginserver"]
        );

        let kinds: Vec<ProcessKind> = specs.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            [
                ProcessKind::Zone,
                ProcessKind::Zone,
                ProcessKind::Zone,
                ProcessKind::World,
                ProcessKind::Relay,
                ProcessKind::Extra,
                ProcessKind::Extra
            ]
        );

        assert!(specs.iter().all(|s| s.working_dir() == Path::new("/srv/eq")));
        assert!(specs[0].program().starts_with("/srv/eq/bin"));
    }

    #[test]
    fn test_fleet_without_zones() {
        let specs = FleetSpec::new("/srv", "/srv/bin").specs();
        let names: Vec<&str> = specs.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["world", "ucs"]);
    }
}
