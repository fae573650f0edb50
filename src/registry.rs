//! Exit-hook registry for cascading shutdown.
//!
//! Every spawned process is recorded here together with the launcher that
//! created it and the artifacts tied to it. Normal teardown happens through
//! `Instance`/`ProcessSupervisor` (which deregister as they go); this
//! registry exists so a host winding down can cascade-terminate whatever is
//! still registered via [`shutdown_all`], typically from its own signal
//! handling. Best effort only: nothing can run after a hard kill of the
//! host itself.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::supervisor::{remove_artifacts, Artifact, ArtifactPaths, ProcessLauncher};

struct ExitRecord {
    pid: u32,
    launcher: Arc<dyn ProcessLauncher>,
    paths: ArtifactPaths,
    cleanup: BTreeSet<Artifact>,
}

static ACTIVE: Mutex<Option<HashMap<u64, ExitRecord>>> = Mutex::new(None);
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Handle for one registered process; deregistered on orderly shutdown.
#[derive(Debug)]
pub(crate) struct Registration {
    token: u64,
}

impl Registration {
    pub(crate) fn deregister(self) {
        if let Some(records) = ACTIVE.lock().as_mut() {
            records.remove(&self.token);
        }
    }
}

pub(crate) fn register(
    pid: u32,
    launcher: Arc<dyn ProcessLauncher>,
    paths: ArtifactPaths,
    cleanup: BTreeSet<Artifact>,
) -> Registration {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    ACTIVE
        .lock()
        .get_or_insert_with(HashMap::new)
        .insert(
            token,
            ExitRecord {
                pid,
                launcher,
                paths,
                cleanup,
            },
        );
    Registration { token }
}

/// Terminate every still-registered process and remove its artifacts.
///
/// Intended for the host's own exit path (signal handler, panic hook).
/// Signal failures are ignored: the target may already be gone, which is
/// the desired end state. Safe to call repeatedly and from any thread.
pub fn shutdown_all() {
    let records: Vec<ExitRecord> = match ACTIVE.lock().as_mut() {
        Some(map) => map.drain().map(|(_, record)| record).collect(),
        None => return,
    };

    if records.is_empty() {
        return;
    }
    info!(count = records.len(), "cascading shutdown of spawned servers");

    for record in records {
        if let Err(e) = record.launcher.signal_terminate(record.pid) {
            debug!(pid = record.pid, error = %e, "exit-hook signal not delivered");
        }
        remove_artifacts(&record.paths, &record.cleanup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::{Path, PathBuf};

    struct NoopLauncher;

    impl ProcessLauncher for NoopLauncher {
        fn launch(&self, _program: &Path, _config_file: &Path) -> io::Result<u32> {
            Ok(1)
        }

        fn signal_terminate(&self, _pid: u32) -> io::Result<()> {
            Ok(())
        }
    }

    fn record_paths() -> ArtifactPaths {
        ArtifactPaths {
            socket: None,
            log: None,
            config: PathBuf::from("/nonexistent/registry-test.config"),
        }
    }

    #[test]
    fn test_deregistered_records_are_not_shut_down() {
        let registration = register(
            99999,
            Arc::new(NoopLauncher),
            record_paths(),
            BTreeSet::new(),
        );
        registration.deregister();

        // Nothing panics and nothing is left behind for this token
        shutdown_all();
    }

    #[test]
    fn test_shutdown_all_drains_registry() {
        let _registration = register(
            99998,
            Arc::new(NoopLauncher),
            record_paths(),
            BTreeSet::new(),
        );

        shutdown_all();
        // A second cascade finds the registry empty
        shutdown_all();
    }
}
