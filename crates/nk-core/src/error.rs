use std::time::Duration;

use crate::types::ReadinessCondition;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Unknown config version '{0}'")]
    UnknownVersion(String),

    #[error("No migration registered from version {from} to {to}")]
    MigrationGap { from: String, to: String },

    #[error("Cannot construct node process: {0}")]
    ProcessConstruction(String),

    #[error("Timed out after {timeout:?} waiting for {condition} readiness")]
    ReadinessTimeout {
        condition: ReadinessCondition,
        timeout: Duration,
    },

    #[error("Unsupported provider class '{0}': expected an IPC or HTTP provider")]
    UnsupportedProvider(String),
}
