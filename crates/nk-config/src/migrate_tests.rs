use super::*;
use crate::registry::{Migration, VersionDefaults};
use nk_core::AppError;
use serde_json::json;
use tempfile::TempDir;

const LEGACY_VERSIONS: [ConfigVersion; 6] = [
    ConfigVersion::V1,
    ConfigVersion::V2,
    ConfigVersion::V3,
    ConfigVersion::V4,
    ConfigVersion::V5,
    ConfigVersion::V6,
];

struct Fixture {
    _root: TempDir,
    project_dir: PathBuf,
    user_config_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let project_dir = root.path().join("project");
        fs::create_dir_all(&project_dir).unwrap();
        let user_config_path = root.path().join("home").join("config.json");
        Self {
            _root: root,
            project_dir,
            user_config_path,
        }
    }

    fn write_legacy(&self, document: &Value) {
        fs::write(
            paths::legacy_config_path(&self.project_dir),
            to_pretty_json(document).unwrap(),
        )
        .unwrap();
    }

    fn write_default_legacy(&self, version: ConfigVersion) {
        let registry = MigrationRegistry::builtin().unwrap();
        self.write_legacy(&registry.default_document(version).unwrap());
    }

    fn legacy_exists(&self) -> bool {
        paths::legacy_config_path(&self.project_dir).exists()
    }

    fn project_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.project_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn upgrade(&self) -> Result<UpgradeOutcome> {
        upgrade_configs(
            &self.project_dir,
            &self.user_config_path,
            ConfigVersion::V7,
        )
    }
}

fn expect_app_error(err: &anyhow::Error) -> &AppError {
    err.downcast_ref::<AppError>()
        .unwrap_or_else(|| panic!("expected AppError, got {err:#}"))
}

#[test]
fn test_every_legacy_default_upgrades_to_latest_defaults() {
    let registry = MigrationRegistry::builtin().unwrap();
    let expected_user = to_pretty_json(&registry.default_user_config(ConfigVersion::V7).unwrap())
        .unwrap();
    let expected_project =
        to_pretty_json(&registry.default_project_config(ConfigVersion::V7).unwrap()).unwrap();

    for version in LEGACY_VERSIONS {
        let fixture = Fixture::new();
        fixture.write_default_legacy(version);

        let outcome = fixture.upgrade().unwrap();

        assert_eq!(
            outcome,
            UpgradeOutcome::Upgraded {
                from: version,
                to: ConfigVersion::V7,
                user_config_path: Some(fixture.user_config_path.clone()),
                project_config_path: paths::project_config_path(&fixture.project_dir),
            }
        );
        assert_eq!(
            fs::read_to_string(&fixture.user_config_path).unwrap(),
            expected_user,
            "user config mismatch upgrading from version {version}"
        );
        assert_eq!(
            fs::read_to_string(paths::project_config_path(&fixture.project_dir)).unwrap(),
            expected_project,
            "project config mismatch upgrading from version {version}"
        );
        assert!(!fixture.legacy_exists());
    }
}

#[test]
fn test_upgrade_twice_is_noop() {
    let fixture = Fixture::new();
    fixture.write_default_legacy(ConfigVersion::V4);
    fixture.upgrade().unwrap();

    let project_path = paths::project_config_path(&fixture.project_dir);
    let user_before = fs::read(&fixture.user_config_path).unwrap();
    let project_before = fs::read(&project_path).unwrap();
    let entries_before = fixture.project_entries();

    let outcome = fixture.upgrade().unwrap();

    assert_eq!(outcome, UpgradeOutcome::AlreadyCurrent);
    assert_eq!(fs::read(&fixture.user_config_path).unwrap(), user_before);
    assert_eq!(fs::read(&project_path).unwrap(), project_before);
    assert_eq!(fixture.project_entries(), entries_before);
}

#[test]
fn test_no_legacy_file_is_noop() {
    let fixture = Fixture::new();
    assert_eq!(fixture.upgrade().unwrap(), UpgradeOutcome::AlreadyCurrent);
    assert!(fixture.project_entries().is_empty());
    assert!(!fixture.user_config_path.exists());
}

#[test]
fn test_unknown_versions_fail_and_leave_project_unchanged() {
    for tag in [json!("0"), json!("8"), json!(99), json!("seven")] {
        let fixture = Fixture::new();
        fixture.write_legacy(&json!({"version": tag, "chains": {}}));
        let legacy_before = fs::read(paths::legacy_config_path(&fixture.project_dir)).unwrap();

        let err = fixture.upgrade().unwrap_err();

        assert!(
            matches!(expect_app_error(&err), AppError::UnknownVersion(_)),
            "tag {tag}: {err:#}"
        );
        assert_eq!(fixture.project_entries(), vec!["nodekeeper.json"]);
        assert_eq!(
            fs::read(paths::legacy_config_path(&fixture.project_dir)).unwrap(),
            legacy_before
        );
        assert!(!fixture.user_config_path.exists());
    }
}

#[test]
fn test_missing_version_tag_is_unknown_version() {
    let fixture = Fixture::new();
    fixture.write_legacy(&json!({"chains": {}}));

    let err = fixture.upgrade().unwrap_err();

    assert!(matches!(expect_app_error(&err), AppError::UnknownVersion(_)));
    assert!(fixture.legacy_exists());
}

#[test]
fn test_customized_legacy_values_survive_upgrade() {
    let fixture = Fixture::new();
    fixture.write_legacy(&json!({
        "version": "1",
        "compilation": {"contracts_source_dir": "./src", "settings": {"optimize": false}},
        "chains": {
            "staging": {
                "chain": {"class": "testnet", "settings": {"rpc_enabled": true}},
                "web3": {"provider": {"class": "http"}}
            }
        }
    }));

    fixture.upgrade().unwrap();

    let user = read_json(&fixture.user_config_path).unwrap();
    let project = read_json(&paths::project_config_path(&fixture.project_dir)).unwrap();
    assert_eq!(user["version"], "7");
    assert_eq!(user["chains"]["staging"]["chain"]["class"], "TestnetChain");
    assert_eq!(
        user["chains"]["staging"]["web3"]["provider"]["class"],
        "web3.HTTPProvider"
    );
    assert_eq!(user["chains"]["staging"]["chain"]["settings"]["rpc_enabled"], true);
    assert_eq!(user["chains"]["local"]["chain"]["class"], "LocalChain");
    assert_eq!(project["compilation"]["contracts_source_dirs"], json!(["./src"]));
    assert_eq!(
        project["compilation"]["backend"]["settings"]["optimize"],
        false
    );
    assert!(project.get("chains").is_none());
}

#[test]
fn test_failing_migration_persists_nothing() {
    fn passthrough(data: Value) -> Result<Value> {
        Ok(data)
    }
    fn explode(_: Value) -> Result<Value> {
        anyhow::bail!("transform exploded")
    }
    const PROJECT_KEYS: &[&str] = &["compilation"];
    let registry = MigrationRegistry::new(
        vec![
            VersionDefaults::parse(ConfigVersion::V1, r#"{"version": "1"}"#, None).unwrap(),
            VersionDefaults::parse(ConfigVersion::V2, r#"{"version": "2"}"#, None).unwrap(),
            VersionDefaults::parse(ConfigVersion::V3, r#"{"version": "3"}"#, Some(PROJECT_KEYS))
                .unwrap(),
        ],
        vec![
            Migration {
                id: "1-ok".to_string(),
                from_version: ConfigVersion::V1,
                to_version: ConfigVersion::V2,
                description: "passes".to_string(),
                apply: Box::new(passthrough),
            },
            Migration {
                id: "2-boom".to_string(),
                from_version: ConfigVersion::V2,
                to_version: ConfigVersion::V3,
                description: "fails".to_string(),
                apply: Box::new(explode),
            },
        ],
    )
    .unwrap();

    let fixture = Fixture::new();
    fixture.write_legacy(&json!({"version": "1", "compilation": {}}));

    let err = MigrationEngine::new(&registry)
        .upgrade(&fixture.project_dir, &fixture.user_config_path, ConfigVersion::V3)
        .unwrap_err();

    assert!(format!("{err:#}").contains("2-boom"), "{err:#}");
    assert!(format!("{err:#}").contains("transform exploded"), "{err:#}");
    assert_eq!(fixture.project_entries(), vec!["nodekeeper.json"]);
    assert!(!fixture.user_config_path.exists());
}

#[test]
fn test_legacy_removal_failure_rolls_back_written_configs() {
    let fixture = Fixture::new();
    fixture.write_default_legacy(ConfigVersion::V1);
    let legacy_path = paths::legacy_config_path(&fixture.project_dir);
    let project_path = paths::project_config_path(&fixture.project_dir);
    let writes = vec![
        (fixture.user_config_path.clone(), json!({"version": "7"})),
        (project_path.clone(), json!({"version": "7"})),
    ];

    let err = commit_upgrade(&writes, &legacy_path, |_| {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only project dir",
        ))
    })
    .unwrap_err();

    assert!(
        format!("{err:#}").contains("Failed to remove legacy config"),
        "{err:#}"
    );
    assert!(fixture.legacy_exists());
    assert!(!project_path.exists());
    assert!(!fixture.user_config_path.exists());
    assert_eq!(fixture.project_entries(), vec!["nodekeeper.json"]);

    let outcome = fixture.upgrade().unwrap();
    assert!(matches!(outcome, UpgradeOutcome::Upgraded { .. }));
    assert!(!fixture.legacy_exists());
    assert!(project_path.exists());
}

#[test]
fn test_existing_user_config_is_preserved() {
    let fixture = Fixture::new();
    let existing_user = json!({
        "version": "7",
        "chains": {"mainnet": {"chain": {"class": "MainnetChain"}}}
    });
    fs::create_dir_all(fixture.user_config_path.parent().unwrap()).unwrap();
    fs::write(
        &fixture.user_config_path,
        to_pretty_json(&existing_user).unwrap(),
    )
    .unwrap();
    fixture.write_default_legacy(ConfigVersion::V5);

    let outcome = fixture.upgrade().unwrap();

    assert!(matches!(
        outcome,
        UpgradeOutcome::Upgraded {
            user_config_path: None,
            ..
        }
    ));
    assert_eq!(read_json(&fixture.user_config_path).unwrap(), existing_user);
    let project = read_json(&paths::project_config_path(&fixture.project_dir)).unwrap();
    let registry = MigrationRegistry::builtin().unwrap();
    let default_user = registry.default_user_config(ConfigVersion::V7).unwrap();
    // Legacy chains differ from the existing user config, so they move into the project.
    assert_eq!(project["chains"], default_user["chains"]);
    assert_eq!(project["compilation"]["backend"]["class"], "solc.combined_json");
}

#[test]
fn test_existing_project_config_blocks_upgrade() {
    let fixture = Fixture::new();
    fixture.write_default_legacy(ConfigVersion::V2);
    let project_path = paths::project_config_path(&fixture.project_dir);
    fs::write(&project_path, "{\"version\": \"7\"}\n").unwrap();

    let err = fixture.upgrade().unwrap_err();

    assert!(err.to_string().contains("already exists"), "{err:#}");
    assert!(fixture.legacy_exists());
    assert_eq!(fs::read_to_string(&project_path).unwrap(), "{\"version\": \"7\"}\n");
    assert!(!fixture.user_config_path.exists());
}

#[test]
fn test_target_before_split_is_rejected() {
    let fixture = Fixture::new();
    fixture.write_default_legacy(ConfigVersion::V1);

    let err = upgrade_configs(
        &fixture.project_dir,
        &fixture.user_config_path,
        ConfigVersion::V3,
    )
    .unwrap_err();

    assert!(err.to_string().contains("predates"), "{err:#}");
    assert!(fixture.legacy_exists());
}

#[test]
fn test_migrate_document_rejects_downgrade() {
    let registry = MigrationRegistry::builtin().unwrap();
    let err = MigrationEngine::new(registry)
        .migrate_document(json!({"version": "6"}), ConfigVersion::V2)
        .unwrap_err();
    assert!(err.to_string().contains("downgrade"), "{err:#}");
}

#[test]
fn test_migrate_document_stamps_each_version() {
    let registry = MigrationRegistry::builtin().unwrap();
    let (source, migrated) = MigrationEngine::new(registry)
        .migrate_document(
            registry.default_document(ConfigVersion::V2).unwrap(),
            ConfigVersion::V4,
        )
        .unwrap();
    assert_eq!(source, ConfigVersion::V2);
    assert_eq!(migrated, registry.default_document(ConfigVersion::V4).unwrap());
}
