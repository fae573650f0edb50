//! Process-wide child reaper.
//!
//! One background thread per host process receives child-exit notifications
//! from the OS and releases the kernel bookkeeping so terminated servers
//! never linger as zombies. The thread only reaps: it never attributes an
//! exit status to a particular supervisor instance, so any number of
//! instances can coexist without competing handlers.
//!
//! The thread blocks on a channel while no children remain and is woken by
//! [`notify_spawned`] after each spawn. Failures here have no caller to
//! report to; they are logged and swallowed.

#[cfg(unix)]
use std::sync::{
    mpsc::{self, Receiver, Sender},
    OnceLock,
};

#[cfg(unix)]
use tracing::{debug, warn};

#[cfg(unix)]
static REAPER: OnceLock<Sender<()>> = OnceLock::new();

/// Wake the reaper after a child has been spawned, starting the thread on
/// first use.
#[cfg(unix)]
pub(crate) fn notify_spawned() {
    let sender = REAPER.get_or_init(|| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || reap_loop(&rx));
        tx
    });
    // Send fails only when the reaper thread is gone; nothing to do then.
    let _ = sender.send(());
}

#[cfg(not(unix))]
pub(crate) fn notify_spawned() {}

#[cfg(unix)]
fn reap_loop(rx: &Receiver<()>) {
    use nix::errno::Errno;
    use nix::sys::wait::waitpid;
    use nix::unistd::Pid;

    while rx.recv().is_ok() {
        loop {
            // Wait for any child. Blocking here is fine: this thread has no
            // other work until a child exits.
            match waitpid(Pid::from_raw(-1), None) {
                Ok(status) => debug!(?status, "reaped child process"),
                Err(Errno::ECHILD) => break,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    warn!(%errno, "waitpid failed, reaper idling");
                    break;
                },
            }
        }
    }
}
