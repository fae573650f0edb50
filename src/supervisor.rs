//! Child process supervision: spawn, track, terminate, clean up.
//!
//! One supervisor owns exactly one process lifetime
//! (`NotStarted -> Running -> Stopped`, no re-entry). Process creation and
//! signal delivery go through the [`ProcessLauncher`] trait so tests can
//! substitute the OS capability.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::registry::{self, Registration};
use crate::reaper;

/// Artifact categories whose lifetime is tied to a supervised process.
///
/// Deserializes from the lowercase names used in TOML spawn options
/// (`"socket"`, `"log"`, `"config"`), see [`SpawnOptions::from_toml`].
///
/// [`SpawnOptions::from_toml`]: crate::spawn::SpawnOptions::from_toml
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    Socket,
    Log,
    Config,
}

impl Artifact {
    /// All categories, the default cleanup set for generated configs.
    pub fn all() -> BTreeSet<Artifact> {
        [Artifact::Socket, Artifact::Log, Artifact::Config]
            .into_iter()
            .collect()
    }
}

/// Concrete filesystem paths backing each artifact category.
///
/// Socket and log paths come from the resolved option set and may be absent
/// when the caller replaced the defaults without them.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub socket: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub config: PathBuf,
}

impl ArtifactPaths {
    fn path(&self, kind: Artifact) -> Option<&Path> {
        match kind {
            Artifact::Socket => self.socket.as_deref(),
            Artifact::Log => self.log.as_deref(),
            Artifact::Config => Some(&self.config),
        }
    }
}

/// Delete the paths for each requested category. Missing files are silently
/// skipped; other failures are logged and never propagated, since cleanup
/// runs on teardown paths with no caller to report to.
pub(crate) fn remove_artifacts(paths: &ArtifactPaths, cleanup: &BTreeSet<Artifact>) {
    for kind in cleanup {
        let Some(path) = paths.path(*kind) else {
            continue;
        };
        match fs::remove_file(path) {
            Ok(()) => debug!(?kind, path = %path.display(), "removed artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => debug!(?kind, path = %path.display(), error = %e, "failed to remove artifact"),
        }
    }
}

/// OS process-creation capability consumed by the supervisor.
///
/// `launch` starts the server executable with the config file path as its
/// sole argument and returns the child's pid. `signal_terminate` delivers
/// a termination signal to a previously launched pid.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, program: &Path, config_file: &Path) -> io::Result<u32>;
    fn signal_terminate(&self, pid: u32) -> io::Result<()>;
}

/// Production launcher backed by `std::process::Command` and SIGTERM.
///
/// The child's stdio is nulled: the server writes to its configured logfile.
/// The handle is dropped after spawn; reaping is the process-wide reaper's
/// job, not the handle's.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsLauncher;

impl ProcessLauncher for OsLauncher {
    fn launch(&self, program: &Path, config_file: &Path) -> io::Result<u32> {
        let child = Command::new(program)
            .arg(config_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();
        drop(child);
        Ok(pid)
    }

    #[cfg(unix)]
    fn signal_terminate(&self, pid: u32) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|errno| io::Error::from_raw_os_error(errno as i32))
    }

    #[cfg(not(unix))]
    fn signal_terminate(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "termination signals require a Unix host",
        ))
    }
}

/// Signal delivery failed because the target no longer exists. The desired
/// end state is already reached, so this is success, not an error.
#[cfg(unix)]
fn process_already_gone(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::ESRCH as i32)
}

#[cfg(not(unix))]
fn process_already_gone(_err: &io::Error) -> bool {
    false
}

/// Supervises one spawned server process and the artifacts tied to it.
///
/// The lifecycle is `NotStarted -> Running -> Stopped` with no re-entry:
/// once a process has been spawned through a supervisor, that supervisor is
/// spent and a second [`spawn`](Self::spawn) fails with
/// [`Error::AlreadySpawned`].
pub struct ProcessSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    paths: ArtifactPaths,
    cleanup: BTreeSet<Artifact>,
    pid: Option<u32>,
    // Set once on successful spawn; distinguishes Stopped from NotStarted
    started: bool,
    registration: Option<Registration>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("paths", &self.paths)
            .field("cleanup", &self.cleanup)
            .field("pid", &self.pid)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Supervisor using the OS launcher.
    pub fn new(paths: ArtifactPaths, cleanup: BTreeSet<Artifact>) -> Self {
        Self::with_launcher(paths, cleanup, Arc::new(OsLauncher))
    }

    /// Supervisor with a custom process-launch capability.
    pub fn with_launcher(
        paths: ArtifactPaths,
        cleanup: BTreeSet<Artifact>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            launcher,
            paths,
            cleanup,
            pid: None,
            started: false,
            registration: None,
        }
    }

    /// Launch `program` bound to `config_file` and record its pid.
    ///
    /// The config file must already exist as a readable file, otherwise
    /// [`Error::ConfigMissing`] is returned and no process is created.
    /// On success the instance is registered for exit-hook cascading
    /// shutdown and the process-wide reaper is notified.
    ///
    /// A supervisor that already spawned once — whether its process is
    /// still running or has been terminated — rejects further spawns with
    /// [`Error::AlreadySpawned`], leaving the tracked process untouched.
    /// A failed spawn does not consume the lifetime and may be retried.
    pub fn spawn(&mut self, program: &Path, config_file: &Path) -> Result<u32> {
        if self.started {
            return Err(Error::AlreadySpawned);
        }
        if !config_file.is_file() {
            return Err(Error::config_missing(config_file));
        }

        let pid = self
            .launcher
            .launch(program, config_file)
            .map_err(|e| Error::io(format!("spawning {}", program.display()), e))?;
        reaper::notify_spawned();

        self.pid = Some(pid);
        self.started = true;
        self.registration = Some(registry::register(
            pid,
            Arc::clone(&self.launcher),
            self.paths.clone(),
            self.cleanup.clone(),
        ));

        info!(
            pid,
            program = %program.display(),
            config = %config_file.display(),
            "spawned server process"
        );
        Ok(pid)
    }

    /// Whether a pid is currently recorded.
    ///
    /// This is an intent check, not a verified-alive check: the OS is never
    /// polled, so a crashed child still reads as running until shutdown.
    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }

    /// Terminate if running; no-op otherwise.
    pub fn shutdown(&mut self) {
        if self.is_running() {
            self.terminate();
        }
    }

    /// Forcibly terminate the tracked process.
    ///
    /// Signal delivery to an already-exited process counts as success. The
    /// pid is cleared and artifact cleanup runs exactly once, regardless of
    /// the signalling outcome. Safe to call repeatedly.
    pub fn terminate(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };

        match self.launcher.signal_terminate(pid) {
            Ok(()) => info!(pid, "terminated server process"),
            Err(e) if process_already_gone(&e) => debug!(pid, "process already exited"),
            Err(e) => warn!(pid, error = %e, "failed to signal server process"),
        }

        if let Some(registration) = self.registration.take() {
            registration.deregister();
        }
        self.cleanup_artifacts();
    }

    /// Delete the artifacts in this supervisor's cleanup set. Missing files
    /// are silently skipped.
    pub fn cleanup_artifacts(&self) {
        remove_artifacts(&self.paths, &self.cleanup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Records launches and signals instead of touching the OS.
    #[derive(Default)]
    struct MockLauncher {
        launched: Mutex<Vec<(PathBuf, PathBuf)>>,
        signalled: Mutex<Vec<u32>>,
        signal_esrch: bool,
    }

    impl ProcessLauncher for MockLauncher {
        fn launch(&self, program: &Path, config_file: &Path) -> io::Result<u32> {
            self.launched
                .lock()
                .push((program.to_path_buf(), config_file.to_path_buf()));
            Ok(4242)
        }

        fn signal_terminate(&self, pid: u32) -> io::Result<()> {
            self.signalled.lock().push(pid);
            if self.signal_esrch {
                #[cfg(unix)]
                return Err(io::Error::from_raw_os_error(
                    nix::errno::Errno::ESRCH as i32,
                ));
            }
            Ok(())
        }
    }

    fn paths_in(tmp: &TempDir) -> ArtifactPaths {
        ArtifactPaths {
            socket: Some(tmp.path().join("server.sock")),
            log: Some(tmp.path().join("server.log")),
            config: tmp.path().join("server.config"),
        }
    }

    fn touch(path: &Path) {
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_spawn_requires_existing_config() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths_in(&tmp), Artifact::all(), launcher.clone());

        let err = sup
            .spawn(Path::new("redis-server"), &tmp.path().join("missing.config"))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigMissing { .. }));
        assert!(!sup.is_running());
        assert!(launcher.launched.lock().is_empty());
    }

    #[test]
    fn test_spawn_records_pid_and_arguments() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        touch(&paths.config);
        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths.clone(), Artifact::all(), launcher.clone());

        let pid = sup.spawn(Path::new("redis-server"), &paths.config).unwrap();
        assert_eq!(pid, 4242);
        assert!(sup.is_running());

        let launched = launcher.launched.lock();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].0, PathBuf::from("redis-server"));
        assert_eq!(launched[0].1, paths.config);
    }

    #[test]
    fn test_shutdown_removes_artifacts_and_leaves_unrelated_files() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        touch(&paths.config);
        touch(paths.socket.as_ref().unwrap());
        touch(paths.log.as_ref().unwrap());
        let unrelated = tmp.path().join("unrelated.txt");
        touch(&unrelated);

        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths.clone(), Artifact::all(), launcher.clone());
        sup.spawn(Path::new("redis-server"), &paths.config).unwrap();
        sup.shutdown();

        assert!(!sup.is_running());
        assert_eq!(launcher.signalled.lock().as_slice(), &[4242]);
        assert!(!paths.config.exists());
        assert!(!paths.socket.as_ref().unwrap().exists());
        assert!(!paths.log.as_ref().unwrap().exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        touch(&paths.config);
        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths.clone(), Artifact::all(), launcher.clone());
        sup.spawn(Path::new("redis-server"), &paths.config).unwrap();

        sup.shutdown();
        sup.shutdown();

        assert!(!sup.is_running());
        // Second call never reached the launcher
        assert_eq!(launcher.signalled.lock().len(), 1);
    }

    #[test]
    fn test_shutdown_without_spawn_is_noop() {
        let tmp = TempDir::new().unwrap();
        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths_in(&tmp), Artifact::all(), launcher.clone());

        sup.shutdown();
        assert!(launcher.signalled.lock().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_swallows_already_exited_process() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        touch(&paths.config);
        let launcher = Arc::new(MockLauncher {
            signal_esrch: true,
            ..Default::default()
        });
        let mut sup =
            ProcessSupervisor::with_launcher(paths.clone(), Artifact::all(), launcher.clone());
        sup.spawn(Path::new("redis-server"), &paths.config).unwrap();

        sup.terminate();

        // ESRCH is success: pid cleared, cleanup still ran
        assert!(!sup.is_running());
        assert!(!paths.config.exists());
    }

    #[test]
    fn test_respawn_after_terminate_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        touch(&paths.config);
        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths.clone(), Artifact::all(), launcher.clone());

        sup.spawn(Path::new("redis-server"), &paths.config).unwrap();
        sup.terminate();

        // Stopped never re-enters Running: one supervisor, one lifetime
        touch(&paths.config);
        let err = sup
            .spawn(Path::new("redis-server"), &paths.config)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadySpawned));
        assert!(!sup.is_running());
        assert_eq!(launcher.launched.lock().len(), 1);
    }

    #[test]
    fn test_spawn_while_running_keeps_original_process() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        touch(&paths.config);
        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths.clone(), Artifact::all(), launcher.clone());

        let pid = sup.spawn(Path::new("redis-server"), &paths.config).unwrap();
        let err = sup
            .spawn(Path::new("redis-server"), &paths.config)
            .unwrap_err();
        assert!(matches!(err, Error::AlreadySpawned));

        // The first process is still tracked and is the one terminated
        assert!(sup.is_running());
        sup.terminate();
        assert_eq!(launcher.signalled.lock().as_slice(), &[pid]);
    }

    #[test]
    fn test_failed_spawn_does_not_consume_the_lifetime() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        let launcher = Arc::new(MockLauncher::default());
        let mut sup =
            ProcessSupervisor::with_launcher(paths.clone(), Artifact::all(), launcher);

        let err = sup
            .spawn(Path::new("redis-server"), &paths.config)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigMissing { .. }));

        // The precondition failure left the supervisor unstarted
        touch(&paths.config);
        sup.spawn(Path::new("redis-server"), &paths.config).unwrap();
        assert!(sup.is_running());
    }

    #[test]
    fn test_cleanup_respects_category_subset() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        touch(&paths.config);
        touch(paths.socket.as_ref().unwrap());
        touch(paths.log.as_ref().unwrap());

        let only_socket: BTreeSet<_> = [Artifact::Socket].into_iter().collect();
        let launcher = Arc::new(MockLauncher::default());
        let mut sup = ProcessSupervisor::with_launcher(paths.clone(), only_socket, launcher);
        sup.spawn(Path::new("redis-server"), &paths.config).unwrap();
        sup.shutdown();

        assert!(!paths.socket.as_ref().unwrap().exists());
        assert!(paths.log.as_ref().unwrap().exists());
        assert!(paths.config.exists());
    }
}
