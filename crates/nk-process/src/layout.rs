//! On-disk layout of a node data directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use tracing::{debug, info};

pub const IPC_FILENAME: &str = "geth.ipc";
/// First ethash DAG file; its presence means DAG generation has finished.
pub const DAG_FILENAME: &str = "full-R23-0000000000000000";

pub fn chaindata_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("chaindata")
}

pub fn dapp_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("dapp")
}

pub fn nodekey_path(data_dir: &Path) -> PathBuf {
    data_dir.join("nodekey")
}

pub fn ipc_path(data_dir: &Path) -> PathBuf {
    data_dir.join(IPC_FILENAME)
}

/// Platform data root of the public networks (`~/.ethereum` on Linux).
pub fn default_ethereum_dir() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    if cfg!(target_os = "macos") {
        Some(base.home_dir().join("Library").join("Ethereum"))
    } else {
        Some(base.home_dir().join(".ethereum"))
    }
}

pub fn default_testnet_dir() -> Option<PathBuf> {
    default_ethereum_dir().map(|dir| dir.join("testnet"))
}

/// Directory where the node writes its ethash DAG files.
pub fn default_ethash_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.home_dir().join(".ethash"))
}

/// Wipe chain state under `data_dir` so the next start begins from genesis.
///
/// Removes chaindata, dapp, nodekey and the IPC socket. Paths that do not
/// exist are skipped; accounts and keystore are left alone.
pub fn reset_chain(data_dir: &Path) -> Result<()> {
    for dir in [chaindata_dir(data_dir), dapp_dir(data_dir)] {
        if dir.is_dir() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
            debug!(path = %dir.display(), "removed chain directory");
        }
    }
    for file in [nodekey_path(data_dir), ipc_path(data_dir)] {
        if file.exists() {
            fs::remove_file(&file)
                .with_context(|| format!("Failed to remove {}", file.display()))?;
            debug!(path = %file.display(), "removed chain file");
        }
    }
    info!(data_dir = %data_dir.display(), "chain reset");
    Ok(())
}
