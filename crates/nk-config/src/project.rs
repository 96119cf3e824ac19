//! Loaded configuration of one project: project layer over user layer over
//! built-in defaults of the latest version.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::migrate::read_json;
use crate::paths;
use crate::registry::MigrationRegistry;
use crate::version::ConfigVersion;

#[derive(Debug, Clone)]
pub struct ProjectConfigs {
    project_dir: PathBuf,
    user_config_path: PathBuf,
    version: ConfigVersion,
    user: Arc<Config>,
    project_layer: Config,
    merged: Config,
}

impl ProjectConfigs {
    /// Load configs for `project_dir`.
    ///
    /// Missing files fall back to the built-in defaults of the latest
    /// version. Files at any other version are rejected; older projects must
    /// be upgraded first. A leftover legacy file is reported through
    /// [`ProjectConfigs::legacy_config_path`].
    pub fn load(project_dir: &Path, user_config_path: &Path) -> Result<Self> {
        let registry = MigrationRegistry::builtin()?;
        let latest = registry.latest_version();

        let legacy = paths::legacy_config_path(project_dir);
        if legacy.exists() {
            warn!(
                path = %legacy.display(),
                "legacy config present; run `nodekeeper upgrade` to migrate it"
            );
        }

        let user_doc = load_document(user_config_path, latest, || {
            registry.default_user_config(latest)
        })?;
        let project_doc = load_document(&paths::project_config_path(project_dir), latest, || {
            registry.default_project_config(latest)
        })?;

        let builtin_user = Arc::new(Config::from_value(registry.default_user_config(latest)?)?);
        let user = Arc::new(Config::from_value(user_doc)?.with_defaults(builtin_user));
        let project_layer = Config::from_value(project_doc)?;
        let merged = project_layer.clone().with_defaults(Arc::clone(&user));

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            user_config_path: user_config_path.to_path_buf(),
            version: latest,
            user,
            project_layer,
            merged,
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn user_config_path(&self) -> &Path {
        &self.user_config_path
    }

    pub fn version(&self) -> ConfigVersion {
        self.version
    }

    /// Effective configuration: project over user over built-in defaults.
    pub fn config(&self) -> &Config {
        &self.merged
    }

    /// User layer with built-in defaults as fallback.
    pub fn user_config(&self) -> &Config {
        &self.user
    }

    /// Project layer alone.
    pub fn project_config(&self) -> &Config {
        &self.project_layer
    }

    /// Legacy single-file config still present in the project, if any.
    pub fn legacy_config_path(&self) -> Option<PathBuf> {
        let path = paths::legacy_config_path(&self.project_dir);
        path.exists().then_some(path)
    }

    /// Names of every configured chain, sorted.
    pub fn chain_names(&self) -> Vec<String> {
        match self.merged.get_config("chains").to_value() {
            Value::Object(chains) => chains.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Merged config section of one chain (`chains.<name>`).
    pub fn chain_config(&self, name: &str) -> Result<Config> {
        let key = format!("chains.{name}");
        if name.is_empty() || name.contains('.') || !self.merged.contains(&key) {
            bail!("chain '{name}' is not configured");
        }
        Ok(self.merged.get_config(&key))
    }
}

fn load_document(
    path: &Path,
    expected: ConfigVersion,
    default: impl FnOnce() -> Result<Value>,
) -> Result<Value> {
    if !path.exists() {
        return default();
    }
    let document = read_json(path)?;
    let version = ConfigVersion::from_document(&document)?;
    MigrationRegistry::builtin()?.ensure_known(version)?;
    if version != expected {
        bail!(
            "config {} is at version {version}, expected {expected}; run `nodekeeper upgrade`",
            path.display()
        );
    }
    Ok(document)
}
