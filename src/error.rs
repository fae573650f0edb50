//! Typed errors for config generation and process supervision.
//!
//! All construction-time and I/O failures surface synchronously through
//! [`Error`]. Failures inside the asynchronous teardown paths (the child
//! reaper, exit-hook cascade) have no caller to report to; those are logged
//! and swallowed instead of appearing here.

use std::path::{Path, PathBuf};

/// Result type for spawn and supervision operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Spawn was attempted without an existing, readable config file.
    /// No process is created when this is returned.
    #[error("config file not found: {path}")]
    ConfigMissing { path: PathBuf },

    /// IO error with context (config write, directory creation).
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Server option overrides were not a mapping of supported values.
    /// Fails fast before any side effect.
    #[error("invalid server option overrides: {0}")]
    InvalidOverrides(String),

    /// A second spawn through the same supervisor. One supervisor owns
    /// exactly one process lifetime; construct a new one instead.
    #[error("supervisor already spawned a process")]
    AlreadySpawned,
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a missing-config error.
    pub fn config_missing(path: impl AsRef<Path>) -> Self {
        Self::ConfigMissing {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an invalid-overrides error.
    pub fn invalid_overrides(reason: impl Into<String>) -> Self {
        Self::InvalidOverrides(reason.into())
    }

    /// Convert to `anyhow::Error` for callers composing with anyhow.
    pub fn into_anyhow(self) -> anyhow::Error {
        anyhow::Error::from(self)
    }
}
