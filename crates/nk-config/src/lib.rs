//! Versioned project configuration: loading, layering, and migration of
//! legacy single-file configs into split user/project documents.

mod builtin;
pub mod config;
mod config_merge;
pub(crate) mod dotted;
pub mod migrate;
pub mod paths;
pub mod project;
pub mod registry;
pub mod version;

pub use config::Config;
pub use config_merge::merge_json_values;
pub use migrate::{MigrationEngine, UpgradeOutcome, upgrade_configs};
pub use project::ProjectConfigs;
pub use registry::{MigrateFn, Migration, MigrationRegistry, VersionDefaults};
pub use version::ConfigVersion;
