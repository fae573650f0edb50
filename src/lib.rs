// Safety: no unsafe anywhere in this crate
#![deny(unsafe_code)]
// Correctness: must handle all fallible operations
#![deny(unused_must_use)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::module_name_repetitions)] // e.g., supervisor::ProcessSupervisor is clearer
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation

//! Spawn and supervise throwaway Redis servers.
//!
//! This crate generates a server configuration file from a layered option
//! set, launches `redis-server` as a child process bound to that file,
//! tracks its lifetime, and removes the associated artifacts (socket, log,
//! config) when it goes away. Typical use is integration test suites that
//! want a private, disposable server per run.
//!
//! # Example
//!
//! ```no_run
//! use redis_spawn::{Instance, OptionSet, ServerDefaults, SpawnOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let defaults = ServerDefaults::standard();
//!     let options = SpawnOptions::default()
//!         .server_opt("databases", 8i64)
//!         .server_opt("save", vec!["900 1", "300 10"]);
//!
//!     let mut server = Instance::spawn(options, &defaults)?;
//!     let socket = server.socket_path().map(std::path::Path::to_path_buf);
//!     // ... connect a client to the unix socket ...
//!     server.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! Shutdown is idempotent and the config/socket/log files tied to a spawned
//! server are deleted exactly once, even when the server already crashed.
//! Dropping an [`Instance`] shuts its server down; a host winding down on a
//! signal can call [`shutdown_all`] to cascade-terminate everything still
//! registered.

pub mod config;
pub mod constants;
pub mod error;
pub mod spawn;
pub mod supervisor;
pub mod writer;

mod reaper;
mod registry;

pub use config::{build_config_line, OptionSet, OptionValue, ServerDefaults};
pub use error::{Error, Result};
pub use registry::shutdown_all;
pub use spawn::{Instance, SpawnOptions};
pub use supervisor::{
    Artifact, ArtifactPaths, OsLauncher, ProcessLauncher, ProcessSupervisor,
};
