//! Stock server option set and pid-derived artifact paths.

use std::path::PathBuf;

use super::OptionSet;
use crate::constants::SPAWNED_PATH_PREFIX;

pub(crate) fn socket_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("{SPAWNED_PATH_PREFIX}.{pid}.sock"))
}

pub(crate) fn log_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("{SPAWNED_PATH_PREFIX}.{pid}.log"))
}

pub(crate) fn data_dir(pid: u32) -> PathBuf {
    PathBuf::from(format!("{SPAWNED_PATH_PREFIX}.{pid}.data"))
}

pub(crate) fn generated_config_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("{SPAWNED_PATH_PREFIX}.{pid}.config"))
}

/// The stock option set for a spawned server owned by `pid`.
///
/// Key order here defines the config file's line order; the rendered text is
/// a compatibility contract, so entries must not be reordered.
pub(crate) fn stock_options(pid: u32) -> OptionSet {
    OptionSet::new()
        .with("port", "0")
        .with("bind", "127.0.0.1")
        .with("unixsocket", socket_path(pid).display().to_string())
        .with("loglevel", "notice")
        .with("logfile", log_path(pid).display().to_string())
        .with("databases", "16")
        .with("save", vec!["900 1", "300 10", "60 10000"])
        .with("rdbcompression", "yes")
        .with("dbfilename", "dump.rdb")
        .with("dir", data_dir(pid).display().to_string())
        .with("appendonly", "no")
        .with("appendfsync", "everysec")
        .with("vm_enabled", "no")
        .with("hash_max_zipmap_entries", "512")
        .with("hash_max_zipmap_value", "64")
        .with("list_max_ziplist_entries", "512")
        .with("list_max_ziplist_value", "64")
        .with("set_max_intset_entries", "512")
        .with("activerehashing", "yes")
}
