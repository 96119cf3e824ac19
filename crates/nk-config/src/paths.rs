//! Filesystem locations of config documents, chain storage, and node logs.

use std::path::{Path, PathBuf};

/// Application name used for platform config directories.
pub const APP_NAME: &str = "nodekeeper";
/// Single-file config predating the user/project split.
pub const LEGACY_CONFIG_FILENAME: &str = "nodekeeper.json";
pub const PROJECT_CONFIG_FILENAME: &str = "project.json";
pub const USER_CONFIG_FILENAME: &str = "config.json";
/// Overrides the user config location (tests, CI, shared machines).
pub const USER_CONFIG_ENV: &str = "NODEKEEPER_USER_CONFIG";

const BLOCKCHAINS_DIRNAME: &str = "chains";
const LOGS_DIRNAME: &str = "logs";

pub fn legacy_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(LEGACY_CONFIG_FILENAME)
}

pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILENAME)
}

fn project_config_dir(app_name: &str) -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", app_name).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Machine-wide user config path.
///
/// Lookup order: `$NODEKEEPER_USER_CONFIG` -> platform config dir.
/// Returns `None` when no home directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(USER_CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    project_config_dir(APP_NAME).map(|dir| dir.join(USER_CONFIG_FILENAME))
}

/// Persistent per-project storage for local chains.
pub fn blockchains_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(BLOCKCHAINS_DIRNAME)
}

pub fn chain_data_dir(blockchains_dir: &Path, chain_name: &str) -> PathBuf {
    blockchains_dir.join(chain_name)
}

pub fn logs_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(LOGS_DIRNAME)
}

/// Log file for one output stream (`stdout`/`stderr`) of a chain's node.
///
/// Timestamped so consecutive runs never clobber each other.
pub fn geth_log_path(project_dir: &Path, chain_name: &str, stream: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    logs_dir(project_dir).join(format!("geth-{chain_name}-{stream}-{stamp}.log"))
}
