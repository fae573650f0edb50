//! Centralized defaults shared across modules.

/// Prefix for all pid-derived artifact paths (socket, log, data dir, config).
///
/// A spawned server owned by process 1234 gets
/// `/tmp/redis-spawned.1234.sock`, `.log`, `.data`, and `.config`. Deriving
/// paths from the supervisor's own pid keeps concurrent instances on one
/// host from colliding.
pub const SPAWNED_PATH_PREFIX: &str = "/tmp/redis-spawned";

/// Name of the server executable resolved from `PATH` when no explicit
/// binary is configured.
pub const DEFAULT_SERVER_EXECUTABLE: &str = "redis-server";
