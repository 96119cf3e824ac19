//! Built-in schema versions and the migrations between them.

use anyhow::Result;
use serde_json::{Value, json};

use crate::dotted;
use crate::registry::{Migration, MigrationRegistry, VersionDefaults};
use crate::version::ConfigVersion;

/// Top-level sections that live in the project document once split.
const PROJECT_SCOPED_KEYS: &[&str] = &["compilation", "contracts"];

const DEFAULT_BACKEND_CLASS: &str = "solc.combined_json";

/// Build a registry pre-loaded with all known versions and migrations.
pub(crate) fn registry() -> Result<MigrationRegistry> {
    let versions = vec![
        VersionDefaults::parse(ConfigVersion::V1, include_str!("../defaults/v1.json"), None)?,
        VersionDefaults::parse(ConfigVersion::V2, include_str!("../defaults/v2.json"), None)?,
        VersionDefaults::parse(ConfigVersion::V3, include_str!("../defaults/v3.json"), None)?,
        VersionDefaults::parse(ConfigVersion::V4, include_str!("../defaults/v4.json"), None)?,
        VersionDefaults::parse(ConfigVersion::V5, include_str!("../defaults/v5.json"), None)?,
        VersionDefaults::parse(ConfigVersion::V6, include_str!("../defaults/v6.json"), None)?,
        VersionDefaults::parse(
            ConfigVersion::V7,
            include_str!("../defaults/v7.json"),
            Some(PROJECT_SCOPED_KEYS),
        )?,
    ];

    let migrations = vec![
        migration(
            ConfigVersion::V1,
            "source-dir-list",
            "Turn compilation.contracts_source_dir into a list of source dirs",
            contracts_source_dir_to_list,
        ),
        migration(
            ConfigVersion::V2,
            "local-chain",
            "Add the local development chain",
            add_local_chain,
        ),
        migration(
            ConfigVersion::V3,
            "qualified-provider-classes",
            "Use qualified web3 provider class names",
            qualify_provider_classes,
        ),
        migration(
            ConfigVersion::V4,
            "compilation-backend",
            "Move compiler settings under compilation.backend",
            move_compiler_settings_to_backend,
        ),
        migration(
            ConfigVersion::V5,
            "contract-backends",
            "Add contract registrar backends",
            add_contract_backends,
        ),
        migration(
            ConfigVersion::V6,
            "qualified-chain-classes",
            "Use qualified chain class names ahead of the user/project split",
            qualify_chain_classes,
        ),
    ];

    MigrationRegistry::new(versions, migrations)
}

fn migration(
    from: ConfigVersion,
    slug: &str,
    description: &str,
    apply: fn(Value) -> Result<Value>,
) -> Migration {
    Migration {
        id: format!("{}-to-{}-{slug}", from, from.next()),
        from_version: from,
        to_version: from.next(),
        description: description.to_string(),
        apply: Box::new(apply),
    }
}

/// Apply `f` to every chain definition under `chains`.
fn for_each_chain(data: &mut Value, mut f: impl FnMut(&mut Value)) {
    if let Some(Value::Object(chains)) = data.get_mut("chains") {
        for chain in chains.values_mut() {
            f(chain);
        }
    }
}

fn rename_string(slot: Option<&mut Value>, renames: &[(&str, &str)]) {
    let Some(Value::String(current)) = slot else {
        return;
    };
    if let Some((_, new)) = renames.iter().find(|(old, _)| *old == current.as_str()) {
        *current = (*new).to_string();
    }
}

fn contracts_source_dir_to_list(mut data: Value) -> Result<Value> {
    if let Some(dir) = dotted::remove(&mut data, "compilation.contracts_source_dir") {
        let dirs = match dir {
            Value::Array(dirs) => dirs,
            single => vec![single],
        };
        dotted::insert(
            &mut data,
            "compilation.contracts_source_dirs",
            Value::Array(dirs),
        )?;
    }
    Ok(data)
}

fn add_local_chain(mut data: Value) -> Result<Value> {
    if dotted::lookup(&data, "chains.local").is_none() {
        dotted::insert(
            &mut data,
            "chains.local",
            json!({
                "chain": {
                    "class": "local",
                    "settings": {"mine": true, "miner_threads": 1}
                },
                "web3": {"provider": {"class": "ipc"}}
            }),
        )?;
    }
    Ok(data)
}

fn qualify_provider_classes(mut data: Value) -> Result<Value> {
    const RENAMES: &[(&str, &str)] = &[("ipc", "web3.IPCProvider"), ("http", "web3.HTTPProvider")];
    for_each_chain(&mut data, |chain| {
        rename_string(chain.pointer_mut("/web3/provider/class"), RENAMES);
    });
    Ok(data)
}

fn move_compiler_settings_to_backend(mut data: Value) -> Result<Value> {
    if dotted::lookup(&data, "compilation").is_none() {
        return Ok(data);
    }
    if let Some(settings) = dotted::remove(&mut data, "compilation.settings") {
        dotted::insert(&mut data, "compilation.backend.settings", settings)?;
    }
    if dotted::lookup(&data, "compilation.backend.class").is_none() {
        dotted::insert(
            &mut data,
            "compilation.backend.class",
            Value::String(DEFAULT_BACKEND_CLASS.to_string()),
        )?;
    }
    Ok(data)
}

fn add_contract_backends(mut data: Value) -> Result<Value> {
    if dotted::lookup(&data, "contracts.backends").is_none() {
        dotted::insert(
            &mut data,
            "contracts.backends",
            json!({
                "JSONFile": {
                    "class": "json_file",
                    "priority": 10,
                    "settings": {"file_path": "./registrar.json"}
                },
                "Memory": {"class": "memory", "priority": 50}
            }),
        )?;
    }
    Ok(data)
}

fn qualify_chain_classes(mut data: Value) -> Result<Value> {
    const RENAMES: &[(&str, &str)] = &[
        ("local", "LocalChain"),
        ("temporary", "TemporaryChain"),
        ("testnet", "TestnetChain"),
        ("mainnet", "MainnetChain"),
    ];
    for_each_chain(&mut data, |chain| {
        rename_string(chain.pointer_mut("/chain/class"), RENAMES);
    });
    Ok(data)
}
