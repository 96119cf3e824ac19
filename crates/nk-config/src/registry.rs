//! Migration registry: ordered schema versions, adjacent-version transforms,
//! and built-in default documents per version.

use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow, bail};
use nk_core::AppError;
use serde_json::{Map, Value};

use crate::version::ConfigVersion;

/// Pure transform from one schema version's document to the next.
pub type MigrateFn = Box<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A single migration between two adjacent versions.
pub struct Migration {
    /// Unique identifier (e.g., "3-to-4-qualified-provider-classes").
    pub id: String,
    pub from_version: ConfigVersion,
    pub to_version: ConfigVersion,
    /// Human-readable description.
    pub description: String,
    pub apply: MigrateFn,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .field("description", &self.description)
            .finish()
    }
}

/// Built-in default document for one version.
#[derive(Debug, Clone)]
pub struct VersionDefaults {
    pub version: ConfigVersion,
    /// Full (unsplit) default document.
    pub document: Value,
    /// Top-level keys stored in the project document. `None` for versions
    /// that predate the user/project split.
    pub project_keys: Option<&'static [&'static str]>,
}

impl VersionDefaults {
    pub fn parse(
        version: ConfigVersion,
        raw: &str,
        project_keys: Option<&'static [&'static str]>,
    ) -> Result<Self> {
        let document: Value = serde_json::from_str(raw)
            .with_context(|| format!("Failed to parse built-in defaults for version {version}"))?;
        let embedded = ConfigVersion::from_document(&document)?;
        if embedded != version {
            bail!("built-in defaults for version {version} are tagged {embedded}");
        }
        Ok(Self {
            version,
            document,
            project_keys,
        })
    }
}

/// Registry holding every known version and the migrations between them.
///
/// Coverage is validated once at construction: versions are contiguous and
/// every adjacent pair has exactly one migration.
#[derive(Debug)]
pub struct MigrationRegistry {
    versions: Vec<VersionDefaults>,
    migrations: Vec<Migration>,
}

impl MigrationRegistry {
    pub fn new(mut versions: Vec<VersionDefaults>, mut migrations: Vec<Migration>) -> Result<Self> {
        if versions.is_empty() {
            bail!("migration registry needs at least one version");
        }
        versions.sort_by_key(|v| v.version);
        migrations.sort_by_key(|m| m.from_version);

        for pair in versions.windows(2) {
            let (prev, next) = (pair[0].version, pair[1].version);
            if prev == next {
                bail!("version {prev} registered twice");
            }
            if next != prev.next() {
                return Err(AppError::MigrationGap {
                    from: prev.to_string(),
                    to: prev.next().to_string(),
                }
                .into());
            }
        }

        let is_known = |v: ConfigVersion| versions.iter().any(|d| d.version == v);
        for migration in &migrations {
            if !is_known(migration.from_version) {
                return Err(AppError::UnknownVersion(migration.from_version.to_string()).into());
            }
            if migration.to_version != migration.from_version.next() {
                bail!(
                    "migration {} must advance exactly one version ({} -> {})",
                    migration.id,
                    migration.from_version,
                    migration.to_version
                );
            }
            if !is_known(migration.to_version) {
                return Err(AppError::UnknownVersion(migration.to_version.to_string()).into());
            }
        }

        for pair in versions.windows(2) {
            let from = pair[0].version;
            let count = migrations
                .iter()
                .filter(|m| m.from_version == from)
                .count();
            match count {
                1 => {}
                0 => {
                    return Err(AppError::MigrationGap {
                        from: from.to_string(),
                        to: pair[1].version.to_string(),
                    }
                    .into());
                }
                _ => bail!("version {from} has {count} migrations registered"),
            }
        }

        Ok(Self {
            versions,
            migrations,
        })
    }

    /// Process-wide registry of built-in versions, validated on first use.
    pub fn builtin() -> Result<&'static MigrationRegistry> {
        static REGISTRY: OnceLock<std::result::Result<MigrationRegistry, String>> =
            OnceLock::new();
        REGISTRY
            .get_or_init(|| crate::builtin::registry().map_err(|e| format!("{e:#}")))
            .as_ref()
            .map_err(|e| anyhow!("built-in migration registry is invalid: {e}"))
    }

    pub fn oldest_version(&self) -> ConfigVersion {
        self.versions[0].version
    }

    pub fn latest_version(&self) -> ConfigVersion {
        self.versions[self.versions.len() - 1].version
    }

    pub fn is_known(&self, version: ConfigVersion) -> bool {
        self.entry(version).is_some()
    }

    pub fn ensure_known(&self, version: ConfigVersion) -> Result<()> {
        if self.is_known(version) {
            Ok(())
        } else {
            Err(AppError::UnknownVersion(version.to_string()).into())
        }
    }

    /// Whether `version` stores settings as separate user/project documents.
    pub fn is_split(&self, version: ConfigVersion) -> bool {
        self.entry(version)
            .is_some_and(|entry| entry.project_keys.is_some())
    }

    /// All versions, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = ConfigVersion> + '_ {
        self.versions.iter().map(|v| v.version)
    }

    pub fn all(&self) -> &[Migration] {
        &self.migrations
    }

    /// The migration that advances `version` by one step.
    pub fn migration_for(&self, version: ConfigVersion) -> Result<&Migration> {
        self.ensure_known(version)?;
        self.migrations
            .iter()
            .find(|m| m.from_version == version)
            .ok_or_else(|| {
                AppError::MigrationGap {
                    from: version.to_string(),
                    to: version.next().to_string(),
                }
                .into()
            })
    }

    /// Full built-in default document for `version`.
    pub fn default_document(&self, version: ConfigVersion) -> Result<Value> {
        Ok(self.known_entry(version)?.document.clone())
    }

    pub fn default_user_config(&self, version: ConfigVersion) -> Result<Value> {
        let (user, _) = self.split(version, self.default_document(version)?)?;
        Ok(user)
    }

    pub fn default_project_config(&self, version: ConfigVersion) -> Result<Value> {
        let (_, project) = self.split(version, self.default_document(version)?)?;
        Ok(project)
    }

    /// Split a full document into `(user, project)` documents following the
    /// schema of `version`. Both halves carry the version tag.
    ///
    /// Versions before the split keep everything in the project document and
    /// produce a user document holding only the tag.
    pub fn split(&self, version: ConfigVersion, document: Value) -> Result<(Value, Value)> {
        let entry = self.known_entry(version)?;
        let Value::Object(mut map) = document else {
            bail!("config document for version {version} is not a JSON object");
        };
        map.insert("version".to_string(), version.to_value());

        let mut user = Map::new();
        user.insert("version".to_string(), version.to_value());

        let Some(project_keys) = entry.project_keys else {
            return Ok((Value::Object(user), Value::Object(map)));
        };

        let mut project = Map::new();
        for (key, value) in map {
            if key == "version" || project_keys.contains(&key.as_str()) {
                project.insert(key, value);
            } else {
                user.insert(key, value);
            }
        }
        Ok((Value::Object(user), Value::Object(project)))
    }

    fn entry(&self, version: ConfigVersion) -> Option<&VersionDefaults> {
        self.versions.iter().find(|v| v.version == version)
    }

    fn known_entry(&self, version: ConfigVersion) -> Result<&VersionDefaults> {
        self.entry(version)
            .ok_or_else(|| AppError::UnknownVersion(version.to_string()).into())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
