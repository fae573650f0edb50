//! Spawning coordinator: resolve options, produce a config file, start the
//! server, and tie artifact cleanup to its lifetime.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::config::{generated_config_path, OptionSet, OptionValue, ServerDefaults};
use crate::constants::DEFAULT_SERVER_EXECUTABLE;
use crate::error::{Error, Result};
use crate::supervisor::{Artifact, ArtifactPaths, OsLauncher, ProcessLauncher, ProcessSupervisor};
use crate::writer;

/// Options for constructing one spawned-server instance.
///
/// All fields have defaults; `..SpawnOptions::default()` covers the common
/// case of "generate a config and start immediately".
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    /// Where to write the generated config file. Defaults to the
    /// pid-derived `/tmp/redis-spawned.<pid>.config`.
    pub generated_config_file: Option<PathBuf>,
    /// Artifact categories to delete on shutdown. `None` means all of
    /// socket, log, and config for a generated config file, and nothing
    /// for a caller-supplied one.
    pub cleanup_files: Option<BTreeSet<Artifact>>,
    /// Server option overrides merged into the defaults.
    pub server_opts: OptionSet,
    /// Start the server during construction. Defaults to true.
    pub start: bool,
    /// Use this existing config file verbatim instead of generating one.
    pub config_file: Option<PathBuf>,
    /// Server binary to launch. Defaults to `redis-server` on `PATH`.
    pub executable: Option<PathBuf>,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            generated_config_file: None,
            cleanup_files: None,
            server_opts: OptionSet::new(),
            start: true,
            config_file: None,
            executable: None,
        }
    }
}

impl SpawnOptions {
    /// Build spawn options from a parsed TOML value.
    ///
    /// Field names mirror [`SpawnOptions`]: `cleanup_files` is a list of
    /// artifact names (`"socket"`, `"log"`, `"config"`) and `server_opts`
    /// is a nested table handled by [`OptionSet::from_toml`]. Unknown
    /// fields, unknown artifact names, and non-table input fail with
    /// [`Error::InvalidOverrides`] before any side effect.
    pub fn from_toml(value: &toml::Value) -> Result<SpawnOptions> {
        #[derive(Debug, Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            generated_config_file: Option<PathBuf>,
            cleanup_files: Option<BTreeSet<Artifact>>,
            server_opts: Option<toml::Value>,
            start: Option<bool>,
            config_file: Option<PathBuf>,
            executable: Option<PathBuf>,
        }

        let raw: Raw = value
            .clone()
            .try_into()
            .map_err(|e| Error::invalid_overrides(e.to_string()))?;

        let server_opts = match raw.server_opts {
            Some(opts) => OptionSet::from_toml(&opts)?,
            None => OptionSet::new(),
        };

        Ok(SpawnOptions {
            generated_config_file: raw.generated_config_file,
            cleanup_files: raw.cleanup_files,
            server_opts,
            start: raw.start.unwrap_or(true),
            config_file: raw.config_file,
            executable: raw.executable,
        })
    }

    /// Set a single server option override.
    #[must_use]
    pub fn server_opt(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.server_opts.set(key, value);
        self
    }

    /// Use an existing config file instead of generating one.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Defer starting the server to an explicit [`Instance::start`] call.
    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.start = false;
        self
    }
}

/// One logical spawned server: its resolved configuration, config file, and
/// supervised process.
///
/// Dropping an `Instance` force-shuts the server down, best effort.
#[derive(Debug)]
pub struct Instance {
    server_opts: OptionSet,
    config_file: PathBuf,
    generated: bool,
    executable: PathBuf,
    supervisor: ProcessSupervisor,
}

impl Instance {
    /// Construct an instance from `options` resolved against `defaults`,
    /// starting the server immediately unless `options.start` is false.
    pub fn spawn(options: SpawnOptions, defaults: &ServerDefaults) -> Result<Instance> {
        Self::spawn_with_launcher(options, defaults, Arc::new(OsLauncher))
    }

    /// As [`spawn`](Self::spawn), with a custom process-launch capability.
    pub fn spawn_with_launcher(
        options: SpawnOptions,
        defaults: &ServerDefaults,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Result<Instance> {
        let server_opts = OptionSet::resolve(defaults.options(), &options.server_opts);

        let explicit_config = options.config_file.is_some();
        let config_file = match options.config_file {
            Some(path) => path,
            None => options
                .generated_config_file
                .unwrap_or_else(|| generated_config_path(std::process::id())),
        };

        // A caller-supplied config file is externally owned: unless the
        // caller also opted into cleanup explicitly, nothing is deleted on
        // shutdown.
        let cleanup = match options.cleanup_files {
            Some(set) => set,
            None if explicit_config => BTreeSet::new(),
            None => Artifact::all(),
        };

        let paths = ArtifactPaths {
            socket: server_opts.scalar("unixsocket").map(PathBuf::from),
            log: server_opts.scalar("logfile").map(PathBuf::from),
            config: config_file.clone(),
        };

        let mut instance = Instance {
            server_opts,
            config_file,
            generated: !explicit_config,
            executable: options
                .executable
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_EXECUTABLE)),
            supervisor: ProcessSupervisor::with_launcher(paths, cleanup, launcher),
        };

        if options.start {
            instance.start()?;
        }
        Ok(instance)
    }

    /// Prepare the config file and working directory, then start the server.
    ///
    /// Generated configs are (re)written from the resolved option set;
    /// caller-supplied ones are used verbatim. Returns the server's pid.
    pub fn start(&mut self) -> Result<u32> {
        if self.generated {
            let text = self.server_opts.render();
            writer::write_config(&self.config_file, &text)?;
        } else {
            debug!(config = %self.config_file.display(), "using caller-supplied config file");
        }

        if let Some(dir) = self.server_opts.scalar("dir") {
            writer::ensure_dir(Path::new(dir))?;
        }

        self.supervisor.spawn(&self.executable, &self.config_file)
    }

    /// Shut the server down if it is running; no-op otherwise.
    pub fn shutdown(&mut self) {
        self.supervisor.shutdown();
    }

    /// Always attempt termination and artifact cleanup.
    pub fn force_shutdown(&mut self) {
        self.supervisor.terminate();
    }

    /// Whether this instance currently tracks a process (intent check, see
    /// [`ProcessSupervisor::is_running`]).
    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    /// Path of the config file this instance uses.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// The fully resolved server option set.
    pub fn server_opts(&self) -> &OptionSet {
        &self.server_opts
    }

    /// Path of the server's unix socket, when configured.
    pub fn socket_path(&self) -> Option<&Path> {
        self.server_opts.scalar("unixsocket").map(Path::new)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // Best-effort cascade: a dropped instance never leaves its server
        // or artifacts behind.
        self.supervisor.shutdown();
    }
}
