//! Node executable lookup and command-line construction.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use nk_core::AppError;

use crate::settings::GethSettings;

/// Overrides the node executable when `geth_executable` is not set.
pub const GETH_ENV: &str = "NODEKEEPER_GETH";
pub const DEFAULT_GETH_EXECUTABLE: &str = "geth";
const NICE_PREFIX: [&str; 3] = ["nice", "-n", "20"];

/// Locate the node executable: explicit setting, then `NODEKEEPER_GETH`,
/// then `geth` on `PATH`.
pub fn resolve_executable(settings: &GethSettings) -> Result<PathBuf> {
    let requested = settings
        .geth_executable
        .clone()
        .or_else(|| env::var(GETH_ENV).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_GETH_EXECUTABLE.to_string());

    which::which(&requested).map_err(|e| {
        AppError::ProcessConstruction(format!("node executable '{requested}' not found: {e}"))
            .into()
    })
}

/// Flags passed to the node for `settings`, excluding any prefix command.
pub fn node_args(settings: &GethSettings) -> Vec<String> {
    let mut args = Vec::new();
    let mut flag = |name: &str, value: Option<String>| {
        if let Some(value) = value {
            args.push(format!("--{name}"));
            args.push(value);
        }
    };

    flag("datadir", settings.data_dir.as_deref().map(path_arg));
    flag("port", settings.port.map(|p| p.to_string()));
    flag("maxpeers", settings.max_peers.map(|p| p.to_string()));
    flag("networkid", settings.network_id.clone());
    flag("verbosity", settings.verbosity.map(|v| v.to_string()));
    flag("unlock", settings.unlock.clone());
    flag("password", settings.password.as_deref().map(path_arg));

    if settings.is_mining() {
        flag("minerthreads", settings.miner_threads.map(|t| t.to_string()));
    }

    if settings.ipc_enabled() {
        flag("ipcpath", settings.ipc_path.as_deref().map(path_arg));
        flag("ipcapi", settings.ipc_api.clone());
    }

    if settings.ws_enabled() {
        flag("wsaddr", settings.ws_addr.clone());
        flag("wsport", settings.ws_port.map(|p| p.to_string()));
        flag("wsorigins", settings.ws_origins.clone());
        flag("wsapi", settings.ws_api.clone());
    }

    if settings.rpc_enabled() {
        flag("rpcaddr", settings.rpc_addr.clone());
        flag("rpcport", settings.rpc_port.map(|p| p.to_string()));
        flag("rpcapi", settings.rpc_api.clone());
    }

    for (key, value) in &settings.suffix_kwargs {
        let name = key.trim_start_matches('-');
        flag(name, Some(value.clone()));
    }

    let switches = [
        ("nodiscover", settings.no_discover.unwrap_or(false)),
        ("mine", settings.is_mining()),
        ("autodag", settings.autodag.unwrap_or(false)),
        ("ipcdisable", !settings.ipc_enabled()),
        ("ws", settings.ws_enabled()),
        ("rpc", settings.rpc_enabled()),
    ];
    for (name, on) in switches {
        if on {
            args.push(format!("--{name}"));
        }
    }

    args.extend(settings.suffix_args.iter().cloned());
    args
}

/// Words placed before the executable (`prefix_cmd`, then `nice`).
pub fn prefix_args(settings: &GethSettings) -> Vec<String> {
    let mut prefix: Vec<String> = settings
        .prefix_cmd
        .as_deref()
        .map(|cmd| cmd.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    if settings.nice.unwrap_or(false) {
        prefix.extend(NICE_PREFIX.iter().map(|s| s.to_string()));
    }
    prefix
}

/// Assemble the full launch command for `executable`.
pub fn build_command(executable: &Path, settings: &GethSettings) -> Command {
    let prefix = prefix_args(settings);
    let mut cmd = match prefix.split_first() {
        Some((program, rest)) => {
            let mut cmd = Command::new(program);
            cmd.args(rest).arg(executable);
            cmd
        }
        None => Command::new(executable),
    };
    cmd.args(node_args(settings));
    cmd
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
