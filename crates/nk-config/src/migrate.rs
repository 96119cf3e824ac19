//! Upgrade of legacy single-file configs into split user/project documents.
//!
//! The legacy file's presence is the trigger: without it `upgrade` is a
//! no-op, which makes repeated upgrades idempotent. With it, the document is
//! stepped one version at a time through the registry, split according to
//! the target schema, persisted, and only then is the legacy file removed.
//! Any failure before that point leaves the project directory untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::paths;
use crate::registry::MigrationRegistry;
use crate::version::ConfigVersion;

/// What `upgrade` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// No legacy config present; nothing was touched.
    AlreadyCurrent,
    Upgraded {
        from: ConfigVersion,
        to: ConfigVersion,
        /// `None` when an existing user config was preserved as-is.
        user_config_path: Option<PathBuf>,
        project_config_path: PathBuf,
    },
}

/// Drives migrations from a registry.
pub struct MigrationEngine<'a> {
    registry: &'a MigrationRegistry,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(registry: &'a MigrationRegistry) -> Self {
        Self { registry }
    }

    /// Step `document` from its embedded version up to `target`.
    ///
    /// Returns the detected source version and the migrated document.
    pub fn migrate_document(
        &self,
        document: Value,
        target: ConfigVersion,
    ) -> Result<(ConfigVersion, Value)> {
        let source = ConfigVersion::from_document(&document)?;
        self.registry.ensure_known(source)?;
        self.registry.ensure_known(target)?;
        if source > target {
            bail!("cannot downgrade config from version {source} to {target}");
        }

        let mut current = source;
        let mut data = document;
        while current < target {
            let migration = self.registry.migration_for(current)?;
            info!(
                id = %migration.id,
                from = %migration.from_version,
                to = %migration.to_version,
                "applying config migration"
            );
            data = (migration.apply)(data)
                .with_context(|| format!("migration {} failed", migration.id))?;
            current = migration.to_version;
            match data.as_object_mut() {
                Some(map) => {
                    map.insert("version".to_string(), current.to_value());
                }
                None => bail!("migration {} produced a non-object document", migration.id),
            }
        }
        Ok((source, data))
    }

    /// Upgrade the legacy config in `project_dir` to `target`.
    pub fn upgrade(
        &self,
        project_dir: &Path,
        user_config_path: &Path,
        target: ConfigVersion,
    ) -> Result<UpgradeOutcome> {
        let legacy_path = paths::legacy_config_path(project_dir);
        if !legacy_path.exists() {
            debug!(project = %project_dir.display(), "no legacy config; nothing to upgrade");
            return Ok(UpgradeOutcome::AlreadyCurrent);
        }

        self.registry.ensure_known(target)?;
        if !self.registry.is_split(target) {
            bail!("target version {target} predates the user/project config split");
        }

        let legacy = read_json(&legacy_path)?;
        let (source, migrated) = self.migrate_document(legacy, target)?;
        let (user_doc, mut project_doc) = self.registry.split(target, migrated)?;

        let project_config_path = paths::project_config_path(project_dir);
        if project_config_path.exists() {
            bail!(
                "refusing to upgrade: {} already exists alongside legacy config {}",
                project_config_path.display(),
                legacy_path.display()
            );
        }

        let mut writes = Vec::with_capacity(2);
        let written_user_path = if user_config_path.exists() {
            let existing = read_json(user_config_path)?;
            if ConfigVersion::from_document(&existing).ok() != Some(target) {
                warn!(
                    path = %user_config_path.display(),
                    "existing user config is not at version {target}; keeping it unchanged"
                );
            }
            carry_user_overrides(&user_doc, &existing, &mut project_doc);
            None
        } else {
            writes.push((user_config_path.to_path_buf(), user_doc));
            Some(user_config_path.to_path_buf())
        };
        writes.push((project_config_path.clone(), project_doc));

        commit_upgrade(&writes, &legacy_path, |path| fs::remove_file(path))?;

        info!(
            project = %project_dir.display(),
            from = %source,
            to = %target,
            "upgraded legacy config"
        );
        Ok(UpgradeOutcome::Upgraded {
            from: source,
            to: target,
            user_config_path: written_user_path,
            project_config_path,
        })
    }
}

/// Upgrade using the built-in registry.
pub fn upgrade_configs(
    project_dir: &Path,
    user_config_path: &Path,
    target: ConfigVersion,
) -> Result<UpgradeOutcome> {
    MigrationEngine::new(MigrationRegistry::builtin()?).upgrade(
        project_dir,
        user_config_path,
        target,
    )
}

/// Copy user-scoped sections of the migrated legacy document that differ
/// from an existing user config into the project document, so the merged
/// view keeps the legacy values without rewriting the shared user file.
fn carry_user_overrides(migrated_user: &Value, existing_user: &Value, project: &mut Value) {
    let (Some(migrated), Some(project)) = (migrated_user.as_object(), project.as_object_mut())
    else {
        return;
    };
    for (key, value) in migrated {
        if key == "version" || existing_user.get(key) == Some(value) {
            continue;
        }
        debug!(section = %key, "carrying legacy user-scope section into project config");
        project.insert(key.clone(), value.clone());
    }
}

pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse config {}", path.display()))
}

pub(crate) fn to_pretty_json(value: &Value) -> Result<String> {
    let mut raw = serde_json::to_string_pretty(value).context("Failed to serialize config")?;
    raw.push('\n');
    Ok(raw)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".upgrade-tmp");
    path.with_file_name(name)
}

/// Persist the split documents and retire the legacy file. If the legacy
/// file cannot be removed, the documents written here are removed again so
/// a retry starts from the same state.
fn commit_upgrade(
    writes: &[(PathBuf, Value)],
    legacy_path: &Path,
    remove_legacy: impl FnOnce(&Path) -> std::io::Result<()>,
) -> Result<()> {
    write_all_or_nothing(writes)?;
    if let Err(error) = remove_legacy(legacy_path) {
        warn!(
            path = %legacy_path.display(),
            "failed to remove legacy config; rolling back upgraded configs"
        );
        let written: Vec<&Path> = writes.iter().map(|(path, _)| path.as_path()).collect();
        roll_back(&written);
        return Err(error)
            .with_context(|| format!("Failed to remove legacy config {}", legacy_path.display()));
    }
    Ok(())
}

fn roll_back(committed: &[&Path]) {
    for path in committed {
        if let Err(error) = fs::remove_file(path) {
            warn!(path = %path.display(), %error, "failed to roll back config");
        }
    }
}

/// Write every document, or none of them.
///
/// Documents are staged next to their targets first; targets are only
/// created once every stage succeeded. Targets created before a failing
/// rename are removed again.
fn write_all_or_nothing(writes: &[(PathBuf, Value)]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(writes.len());
    let stage_result: Result<()> = (|| {
        for (path, value) in writes {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config dir {}", parent.display())
                })?;
            }
            let tmp = staging_path(path);
            fs::write(&tmp, to_pretty_json(value)?)
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            staged.push((tmp, path.as_path()));
        }
        Ok(())
    })();
    if let Err(error) = stage_result {
        for (tmp, _) in &staged {
            let _ = fs::remove_file(tmp);
        }
        return Err(error);
    }

    let mut committed: Vec<&Path> = Vec::with_capacity(staged.len());
    for (index, (tmp, target)) in staged.iter().enumerate() {
        if let Err(error) = fs::rename(tmp, target) {
            for (pending, _) in &staged[index..] {
                let _ = fs::remove_file(pending);
            }
            roll_back(&committed);
            return Err(error).with_context(|| format!("Failed to write {}", target.display()));
        }
        committed.push(*target);
    }
    Ok(())
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
