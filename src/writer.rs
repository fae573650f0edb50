//! Config file persistence and working-directory creation.
//!
//! Writes are not transactional: a crash mid-write leaves a partial file,
//! which the spawned server rejects on startup. That is an observable,
//! fail-fast outcome rather than silent corruption.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Write `text` verbatim to `path`, truncating any existing content.
///
/// Returns the path for convenience. Fails with [`Error::Io`] when the
/// parent directory is missing or not writable.
pub fn write_config(path: &Path, text: &str) -> Result<PathBuf> {
    fs::write(path, text)
        .map_err(|e| Error::io(format!("writing config file {}", path.display()), e))?;
    debug!(path = %path.display(), bytes = text.len(), "wrote config file");
    Ok(path.to_path_buf())
}

/// Create `path` as a directory if absent; no-op when it already exists.
///
/// Fails with [`Error::Io`] on any other filesystem error, including the
/// path existing as a regular file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::io(format!("creating directory {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_config_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("server.config");

        let written = write_config(&path, "port 0\nbind 127.0.0.1\n").unwrap();
        assert_eq!(written, path);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "port 0\nbind 127.0.0.1\n"
        );
    }

    #[test]
    fn test_write_config_truncates_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("server.config");

        fs::write(&path, "old content that is much longer than the new one\n").unwrap();
        write_config(&path, "port 0\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "port 0\n");
    }

    #[test]
    fn test_write_config_missing_parent_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("does-not-exist").join("server.config");

        let err = write_config(&path, "port 0\n").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_ensure_dir_creates_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("data");

        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
        ensure_dir(&dir).unwrap();
    }

    #[test]
    fn test_ensure_dir_fails_on_regular_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("occupied");
        fs::write(&file, "not a directory").unwrap();

        let err = ensure_dir(&file).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
