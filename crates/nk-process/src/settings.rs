//! Recognized node settings (`chain.settings` in a chain config).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use nk_core::AppError;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::layout;

/// Keys accepted by [`GethSettings::from_value`]. Anything else is ignored
/// with a warning.
pub const RECOGNIZED_SETTINGS: &[&str] = &[
    "data_dir",
    "geth_executable",
    "max_peers",
    "network_id",
    "no_discover",
    "mine",
    "autodag",
    "miner_threads",
    "nice",
    "unlock",
    "password",
    "port",
    "verbosity",
    "ipc_disable",
    "ipc_path",
    "ipc_api",
    "ws_enabled",
    "ws_addr",
    "ws_origins",
    "ws_port",
    "ws_api",
    "rpc_enabled",
    "rpc_addr",
    "rpc_port",
    "rpc_api",
    "prefix_cmd",
    "suffix_args",
    "suffix_kwargs",
];

pub const DEFAULT_RPC_PORT: u16 = 8545;
const DEV_NETWORK_ID: &str = "1234";
const MAINNET_NETWORK_ID: &str = "1";
const TESTNET_NETWORK_ID: &str = "3";

/// Launch settings for a geth-compatible node. `None` leaves the node's own
/// default in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GethSettings {
    pub data_dir: Option<PathBuf>,
    pub geth_executable: Option<String>,
    pub max_peers: Option<u32>,
    #[serde(deserialize_with = "string_or_number")]
    pub network_id: Option<String>,
    pub no_discover: Option<bool>,
    pub mine: Option<bool>,
    pub autodag: Option<bool>,
    pub miner_threads: Option<u32>,
    pub nice: Option<bool>,
    pub unlock: Option<String>,
    pub password: Option<PathBuf>,
    pub port: Option<u16>,
    pub verbosity: Option<u8>,
    pub ipc_disable: Option<bool>,
    pub ipc_path: Option<PathBuf>,
    pub ipc_api: Option<String>,
    pub ws_enabled: Option<bool>,
    pub ws_addr: Option<String>,
    pub ws_origins: Option<String>,
    pub ws_port: Option<u16>,
    pub ws_api: Option<String>,
    pub rpc_enabled: Option<bool>,
    pub rpc_addr: Option<String>,
    pub rpc_port: Option<u16>,
    pub rpc_api: Option<String>,
    pub prefix_cmd: Option<String>,
    pub suffix_args: Vec<String>,
    #[serde(deserialize_with = "string_or_number_map")]
    pub suffix_kwargs: BTreeMap<String, String>,
}

impl GethSettings {
    /// Parse a settings mapping. `null` means "no overrides".
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(AppError::ProcessConstruction(format!(
                    "node settings must be a mapping, got {other}"
                ))
                .into());
            }
        };

        let mut recognized = Map::new();
        for (key, value) in map {
            if RECOGNIZED_SETTINGS.contains(&key.as_str()) {
                recognized.insert(key.clone(), value.clone());
            } else {
                warn!(setting = %key, "ignoring unrecognized node setting");
            }
        }
        serde_json::from_value(Value::Object(recognized)).map_err(|e| {
            AppError::ProcessConstruction(format!("invalid node settings: {e}")).into()
        })
    }

    /// Private development chain rooted at `data_dir`: no discovery, no
    /// peers, mining with one thread.
    pub fn dev(data_dir: &Path) -> Self {
        Self {
            data_dir: Some(data_dir.to_path_buf()),
            network_id: Some(DEV_NETWORK_ID.to_string()),
            no_discover: Some(true),
            max_peers: Some(0),
            mine: Some(true),
            miner_threads: Some(1),
            ipc_path: Some(layout::ipc_path(data_dir)),
            ..Self::default()
        }
    }

    pub fn testnet(data_dir: &Path) -> Self {
        Self {
            data_dir: Some(data_dir.to_path_buf()),
            network_id: Some(TESTNET_NETWORK_ID.to_string()),
            ..Self::default()
        }
    }

    pub fn mainnet(data_dir: &Path) -> Self {
        Self {
            data_dir: Some(data_dir.to_path_buf()),
            network_id: Some(MAINNET_NETWORK_ID.to_string()),
            ..Self::default()
        }
    }

    /// Layer `overrides` on top of `self`; every value set in `overrides`
    /// wins. Non-empty `suffix_args` replace, `suffix_kwargs` merge.
    pub fn overlay(mut self, overrides: GethSettings) -> Self {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(
                    if overrides.$field.is_some() {
                        self.$field = overrides.$field;
                    }
                )*
            };
        }
        take!(
            data_dir,
            geth_executable,
            max_peers,
            network_id,
            no_discover,
            mine,
            autodag,
            miner_threads,
            nice,
            unlock,
            password,
            port,
            verbosity,
            ipc_disable,
            ipc_path,
            ipc_api,
            ws_enabled,
            ws_addr,
            ws_origins,
            ws_port,
            ws_api,
            rpc_enabled,
            rpc_addr,
            rpc_port,
            rpc_api,
            prefix_cmd,
        );
        if !overrides.suffix_args.is_empty() {
            self.suffix_args = overrides.suffix_args;
        }
        self.suffix_kwargs.extend(overrides.suffix_kwargs);
        self
    }

    pub fn is_mining(&self) -> bool {
        self.mine.unwrap_or(false)
    }

    pub fn ipc_enabled(&self) -> bool {
        !self.ipc_disable.unwrap_or(false)
    }

    pub fn rpc_enabled(&self) -> bool {
        self.rpc_enabled.unwrap_or(false)
    }

    pub fn ws_enabled(&self) -> bool {
        self.ws_enabled.unwrap_or(false)
    }

    /// Effective IPC socket path: explicit path, else `<data_dir>/geth.ipc`.
    pub fn effective_ipc_path(&self) -> Option<PathBuf> {
        if !self.ipc_enabled() {
            return None;
        }
        self.ipc_path
            .clone()
            .or_else(|| self.data_dir.as_deref().map(layout::ipc_path))
    }

    pub fn effective_rpc_port(&self) -> Option<u16> {
        self.rpc_enabled()
            .then(|| self.rpc_port.unwrap_or(DEFAULT_RPC_PORT))
    }
}

fn number_or_string_value(value: Value) -> std::result::Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(format!("expected a string or number, got {other}")),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    number_or_string_value(value).map_err(serde::de::Error::custom)
}

fn string_or_number_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    for (key, value) in raw {
        match number_or_string_value(value).map_err(serde::de::Error::custom)? {
            Some(v) => {
                out.insert(key, v);
            }
            None => {
                out.insert(key, String::new());
            }
        }
    }
    Ok(out)
}
