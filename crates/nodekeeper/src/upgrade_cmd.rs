//! Handler for the `nodekeeper upgrade` subcommand.

use std::path::Path;

use anyhow::Result;
use nk_config::{MigrationRegistry, UpgradeOutcome, upgrade_configs};

pub(crate) fn handle_upgrade(project_dir: &Path, user_config: &Path) -> Result<()> {
    let target = MigrationRegistry::builtin()?.latest_version();
    let outcome = upgrade_configs(project_dir, user_config, target)?;
    eprintln!("{}", describe_outcome(&outcome));
    Ok(())
}

fn describe_outcome(outcome: &UpgradeOutcome) -> String {
    match outcome {
        UpgradeOutcome::AlreadyCurrent => {
            "No legacy config found; nothing to upgrade.".to_string()
        }
        UpgradeOutcome::Upgraded {
            from,
            to,
            user_config_path,
            project_config_path,
        } => {
            let user = match user_config_path {
                Some(path) => format!("wrote {}", path.display()),
                None => "kept existing user config".to_string(),
            };
            format!(
                "Upgraded config from version {from} to {to}: {user}, wrote {}",
                project_config_path.display()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nk_config::{ConfigVersion, paths};
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_upgrade_twice_is_noop() {
        let root = tempdir().unwrap();
        let project_dir = root.path().join("project");
        std::fs::create_dir_all(&project_dir).unwrap();
        let user_config = root.path().join("user.json");
        let legacy = MigrationRegistry::builtin()
            .unwrap()
            .default_document(ConfigVersion::V1)
            .unwrap();
        std::fs::write(
            paths::legacy_config_path(&project_dir),
            serde_json::to_string(&legacy).unwrap(),
        )
        .unwrap();

        handle_upgrade(&project_dir, &user_config).unwrap();
        let project = std::fs::read_to_string(paths::project_config_path(&project_dir)).unwrap();
        handle_upgrade(&project_dir, &user_config).unwrap();

        assert!(!paths::legacy_config_path(&project_dir).exists());
        assert!(user_config.exists());
        assert_eq!(
            std::fs::read_to_string(paths::project_config_path(&project_dir)).unwrap(),
            project
        );
    }

    #[test]
    fn test_describe_outcome() {
        assert!(describe_outcome(&UpgradeOutcome::AlreadyCurrent).contains("nothing to upgrade"));

        let text = describe_outcome(&UpgradeOutcome::Upgraded {
            from: ConfigVersion::V3,
            to: ConfigVersion::V7,
            user_config_path: None,
            project_config_path: PathBuf::from("/p/project.json"),
        });
        assert!(text.contains("from version 3 to 7"), "{text}");
        assert!(text.contains("kept existing user config"), "{text}");
    }
}
